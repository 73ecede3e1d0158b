//! Completion Verifier
//!
//! Resolves an ambiguous upload by reading back the stored content
//! fingerprint from the server's read side and comparing it to the local
//! one. Bounded attempts with a fixed backoff between them; never retries
//! the upload itself.

use async_trait::async_trait;

use crate::config::VerifierConfig;
use crate::error::{Result, UploadError};
use crate::hash::Fingerprint;

/// Read-side lookup of a stored file's fingerprint
#[async_trait]
pub trait FileInfoSource: Send + Sync {
    /// Stored content fingerprint as reported by the server
    ///
    /// `Ok(None)` when the server doesn't hold the file.
    async fn content_hash(&self, vault: &str, path: &str) -> Result<Option<String>>;
}

/// Polls a [`FileInfoSource`] until the fingerprint matches
pub struct CompletionVerifier<S> {
    source: S,
    config: VerifierConfig,
}

impl<S: FileInfoSource> CompletionVerifier<S> {
    pub fn new(source: S, config: VerifierConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Confirm the server stores `expected` at `vault`/`path`
    pub async fn verify(&self, vault: &str, path: &str, expected: Fingerprint) -> Result<()> {
        let attempts = self.config.attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            match self.source.content_hash(vault, path).await {
                Ok(Some(reported)) if expected.matches(&reported) => {
                    tracing::info!(vault = %vault, path = %path, attempt, "Upload verified");
                    return Ok(());
                }
                Ok(Some(reported)) => {
                    last_reason = format!("content hash mismatch: expected {}, got {}", expected, reported);
                }
                Ok(None) => {
                    last_reason = "file not present on server".to_string();
                }
                Err(e) => {
                    last_reason = e.to_string();
                }
            }

            tracing::debug!(
                vault = %vault,
                path = %path,
                attempt,
                reason = %last_reason,
                "Verification attempt failed"
            );

            if attempt < attempts {
                tokio::time::sleep(self.config.backoff).await;
            }
        }

        Err(UploadError::Verification {
            attempts,
            reason: last_reason,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
