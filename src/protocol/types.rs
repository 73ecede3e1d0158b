//! Sync protocol message types

use serde::{Deserialize, Serialize};

use crate::hash::Fingerprint;

// ============================================================================
// Constants
// ============================================================================

/// Success, or upload finished without a data frame
pub const CODE_SUCCESS: i64 = 1;

/// Legacy "content already present, no update"
pub const CODE_NO_UPDATE_LEGACY: i64 = 2;

/// "No upload needed"
pub const CODE_NO_UPDATE: i64 = 6;

/// Separator between action tag and body in text frames
pub const ACTION_SEPARATOR: char = '|';

/// Actions the server relays from other clients; never meant for us
pub const BROADCAST_ACTIONS: &[&str] = &[
    "FileSyncUpdate",
    "FileSyncDelete",
    "FileSyncRename",
    "FileSyncMtime",
    "FileSyncChunkDownload",
];

/// Whether a status code may signal completion
///
/// The meaning of 1, 2 and 6 shifted across server revisions, so all
/// three are treated as "possibly complete".
pub fn is_completion_code(code: i64) -> bool {
    matches!(code, CODE_SUCCESS | CODE_NO_UPDATE_LEGACY | CODE_NO_UPDATE)
}

// ============================================================================
// Actions
// ============================================================================

/// Action tags used in text frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Authorization,
    ClientInfo,
    FileUploadCheck,
    FileUpload,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Authorization => "Authorization",
            Action::ClientInfo => "ClientInfo",
            Action::FileUploadCheck => "FileUploadCheck",
            Action::FileUpload => "FileUpload",
        }
    }
}

// ============================================================================
// Client -> Server Bodies
// ============================================================================

/// Client identity sent after authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub client_type: String,
    /// Conflict-resolution strategy for offline edits
    pub offline_sync_strategy: String,
}

/// Upload negotiation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadCheck {
    pub vault: String,
    pub path: String,
    pub path_hash: Fingerprint,
    pub content_hash: Fingerprint,
    pub size: u64,
    /// Create time, ms since epoch
    pub ctime: i64,
    /// Modify time, ms since epoch
    pub mtime: i64,
}

// ============================================================================
// Server -> Client Bodies
// ============================================================================

/// Reply to the credential frame
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationReply {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply to the upload check
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileUploadReply {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<FileUploadData>,
}

/// Session parameters issued by the server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadData {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl FileUploadReply {
    /// Non-empty session identifier, if one was issued
    pub fn session_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.session_id.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Negotiated chunk size, falling back to `default` when absent or zero
    pub fn chunk_size_or(&self, default: usize) -> usize {
        self.data
            .as_ref()
            .and_then(|d| d.chunk_size)
            .filter(|&size| size > 0)
            .unwrap_or(default)
    }
}

/// Parsed inbound text frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Authorization(AuthorizationReply),
    /// Handshake acknowledgment; the body carries nothing we use
    ClientInfo,
    /// Legacy reply to the upload check
    FileUploadCheck { code: Option<i64> },
    FileUpload(FileUploadReply),
    /// Another client's activity relayed by the server
    Broadcast(String),
    /// Any other action
    Other { action: String, code: Option<i64> },
    /// JSON body without an action prefix
    Bare { code: Option<i64> },
}

impl ServerMessage {
    /// Status code carried by the message, if any
    pub fn code(&self) -> Option<i64> {
        match self {
            ServerMessage::FileUpload(reply) => Some(reply.code),
            ServerMessage::FileUploadCheck { code }
            | ServerMessage::Other { code, .. }
            | ServerMessage::Bare { code } => *code,
            _ => None,
        }
    }
}
