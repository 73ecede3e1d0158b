//! Error types for the upload client
//!
//! Every failure is scoped to a single file: the orchestrator converts an
//! `UploadError` into that file's `UploadResult` and moves on.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for upload operations
pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload error type
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The server rejected the credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Malformed frame or missing required field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// No terminal state reached within the bounded wait
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Read-side confirmation never produced a fingerprint match
    #[error("Verification failed after {attempts} attempts: {reason}")]
    Verification { attempts: u32, reason: String },

    /// Pre-flight check found no such local file
    #[error("file not found: {}", .0.display())]
    LocalFileMissing(PathBuf),

    /// Local read failure after the pre-flight check
    #[error("IO error: {0}")]
    Io(String),
}

impl UploadError {
    /// Stable machine-readable tag for logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Timeout(_) => "TIMEOUT_ERROR",
            Self::Verification { .. } => "VERIFICATION_FAILURE",
            Self::LocalFileMissing(_) => "LOCAL_FILE_MISSING",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::Protocol(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for UploadError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        UploadError::Network(err.to_string())
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Network(err.to_string())
    }
}
