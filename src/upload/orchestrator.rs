//! Upload Orchestrator
//!
//! Uploads a list of local files into one vault, strictly one at a time.
//! A failure on one file never stops the batch; every input produces
//! exactly one [`UploadResult`], in input order.

use std::path::{Path, PathBuf};

use super::session::SessionRunner;
use super::types::{base_name, remote_path, BatchReport, FileDescriptor, SessionOutcome, UploadResult, UploadTarget};
use super::verifier::{CompletionVerifier, FileInfoSource};
use crate::api::FileInfoClient;
use crate::config::Config;
use crate::error::{Result, UploadError};

/// Sequences upload sessions for a batch of files
pub struct Uploader<S> {
    runner: SessionRunner<S>,
    vault: String,
    prefix: String,
}

impl Uploader<FileInfoClient> {
    /// Build an uploader talking to the configured server
    pub fn from_config(config: &Config) -> Result<Self> {
        let info = FileInfoClient::new(&config.server.base_url, &config.server.token, &config.verify)?;
        Ok(Self::new(config, info))
    }
}

impl<S: FileInfoSource + 'static> Uploader<S> {
    pub fn new(config: &Config, info: S) -> Self {
        let runner = SessionRunner::new(
            config.sync_url(),
            config.server.token.clone(),
            config.client.to_client_info(),
            config.timing.clone(),
            CompletionVerifier::new(info, config.verify.clone()),
        );

        Self {
            runner,
            vault: config.upload.vault.clone(),
            prefix: config.upload.prefix.clone(),
        }
    }

    /// Upload every file in order, collecting one result per input
    pub async fn upload_batch(&self, files: &[PathBuf]) -> BatchReport {
        let mut report = BatchReport::default();

        for (i, file) in files.iter().enumerate() {
            let result = self.upload_one(file).await;

            if result.success {
                tracing::info!(file = %result.file, path = %result.path, "Uploaded");
            } else {
                tracing::warn!(
                    file = %result.file,
                    path = %result.path,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Upload failed"
                );
            }
            report.results.push(result);

            // Let the server settle the previous upload before the next one
            let between = self.runner.timing().between_files;
            if i + 1 < files.len() && !between.is_zero() {
                tokio::time::sleep(between).await;
            }
        }

        tracing::info!(
            total = report.results.len(),
            failed = report.failure_count(),
            "Batch complete"
        );

        report
    }

    /// Upload a single file; never fails, errors land in the result
    pub async fn upload_one(&self, file: &Path) -> UploadResult {
        let path = remote_path(&self.prefix, file);

        match self.try_upload(file, &path).await {
            Ok(()) => UploadResult::succeeded(base_name(file), path),
            Err(error @ UploadError::LocalFileMissing(_)) => {
                UploadResult::failed(file.display().to_string(), path, &error)
            }
            Err(error) => {
                tracing::debug!(code = error.code(), error = %error, "Session failed");
                UploadResult::failed(base_name(file), path, &error)
            }
        }
    }

    async fn try_upload(&self, file: &Path, path: &str) -> Result<()> {
        // Pre-flight: no connection for files that aren't there
        let descriptor = FileDescriptor::compute(file, path).await?;
        let target = UploadTarget::new(self.vault.clone(), path);

        tracing::debug!(
            vault = %target.vault,
            path = %target.path,
            size = descriptor.size,
            content_hash = %descriptor.content_hash,
            "Starting upload session"
        );

        match self.runner.run(&descriptor, &target).await {
            SessionOutcome::Completed { chunks } => {
                tracing::debug!(path = %target.path, chunks, "Server confirmed upload");
                Ok(())
            }
            SessionOutcome::Unchanged => {
                tracing::debug!(path = %target.path, "Content already present");
                Ok(())
            }
            SessionOutcome::Verified { chunks } => {
                tracing::debug!(path = %target.path, chunks, "Upload confirmed by read-back");
                Ok(())
            }
            SessionOutcome::Failed(error) => Err(error),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
