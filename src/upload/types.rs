//! Upload types

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, UploadError};
use crate::hash::{fingerprint_file, path_fingerprint, Fingerprint};
use crate::protocol::FileUploadCheck;

// ============================================================================
// File Descriptor
// ============================================================================

/// Local file facts computed once at session start
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub local_path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub content_hash: Fingerprint,
    pub path_hash: Fingerprint,
}

impl FileDescriptor {
    /// Stat and fingerprint a local file destined for `remote_path`
    pub async fn compute(local_path: &Path, remote_path: &str) -> Result<Self> {
        let metadata = match tokio::fs::metadata(local_path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(UploadError::LocalFileMissing(local_path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::LocalFileMissing(local_path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let modified = metadata.modified()?;
        // Not every filesystem records a birth time
        let created = metadata.created().unwrap_or(modified);
        let (content_hash, size) = fingerprint_file(local_path).await?;

        Ok(Self {
            local_path: local_path.to_path_buf(),
            size,
            modified: to_utc(modified),
            created: to_utc(created),
            content_hash,
            path_hash: path_fingerprint(remote_path),
        })
    }

    /// Build the negotiation request for this file
    pub fn upload_check(&self, target: &UploadTarget) -> FileUploadCheck {
        FileUploadCheck {
            vault: target.vault.clone(),
            path: target.path.clone(),
            path_hash: self.path_hash,
            content_hash: self.content_hash,
            size: self.size,
            ctime: self.created.timestamp_millis(),
            mtime: self.modified.timestamp_millis(),
        }
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

// ============================================================================
// Target
// ============================================================================

/// Where a file goes on the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub vault: String,
    /// Vault-relative path
    pub path: String,
}

impl UploadTarget {
    pub fn new(vault: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            path: path.into(),
        }
    }
}

/// Join an optional directory prefix and a file's base name
pub fn remote_path(prefix: &str, local_path: &Path) -> String {
    let name = base_name(local_path);
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

pub(crate) fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

// ============================================================================
// Session State
// ============================================================================

/// Upload session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Connecting,
    Authenticating,
    AwaitingCheck,
    Uploading,
    AwaitingCompletion,
    /// Socket closed without an ack, reading back the stored fingerprint
    Verifying,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// Server confirmed the upload
    Completed { chunks: u32 },
    /// Server already holds this content; nothing was sent
    Unchanged,
    /// No ack arrived, but the read side reports the expected fingerprint
    Verified { chunks: u32 },
    Failed(UploadError),
}

// ============================================================================
// Results
// ============================================================================

/// Per-file result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub file: String,
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub fn succeeded(file: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            path: path.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(file: impl Into<String>, path: impl Into<String>, error: &UploadError) -> Self {
        Self {
            file: file.into(),
            path: path.into(),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Ordered results of a batch
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct BatchReport {
    pub results: Vec<UploadResult>,
}

impl BatchReport {
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Process exit status: failures only count under `strict`
    pub fn exit_code(&self, strict: bool) -> u8 {
        if strict && !self.is_success() {
            1
        } else {
            0
        }
    }
}
