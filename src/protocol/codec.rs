//! Frame encoding and parsing
//!
//! Text frames are `<action>|<body>`. Binary data frames are
//! `"00"` + session id (ASCII) + 4-byte big-endian chunk index + payload.

use serde_json::Value;

use super::types::{
    Action, AuthorizationReply, ClientInfo, FileUploadCheck, FileUploadReply, ServerMessage,
    ACTION_SEPARATOR, BROADCAST_ACTIONS,
};
use crate::error::{Result, UploadError};

/// Literal marker opening every binary data frame
pub const CHUNK_MARKER: &[u8; 2] = b"00";

// ============================================================================
// Client Frames
// ============================================================================

/// Outbound text frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Raw bearer token, not JSON
    Authorization(String),
    ClientInfo(ClientInfo),
    FileUploadCheck(FileUploadCheck),
}

impl ClientFrame {
    pub fn action(&self) -> Action {
        match self {
            ClientFrame::Authorization(_) => Action::Authorization,
            ClientFrame::ClientInfo(_) => Action::ClientInfo,
            ClientFrame::FileUploadCheck(_) => Action::FileUploadCheck,
        }
    }

    /// Encode as `<action>|<body>`
    pub fn encode(&self) -> Result<String> {
        let body = match self {
            ClientFrame::Authorization(token) => token.clone(),
            ClientFrame::ClientInfo(info) => serde_json::to_string(info)?,
            ClientFrame::FileUploadCheck(check) => serde_json::to_string(check)?,
        };
        Ok(format!("{}{}{}", self.action().as_str(), ACTION_SEPARATOR, body))
    }
}

// ============================================================================
// Server Frames
// ============================================================================

fn code_of(body: &Value) -> Option<i64> {
    body.get("code").and_then(Value::as_i64)
}

/// Parse an inbound text frame
pub fn parse_server_frame(raw: &str) -> Result<ServerMessage> {
    let Some((action, body)) = raw.split_once(ACTION_SEPARATOR) else {
        let body: Value = serde_json::from_str(raw.trim())
            .map_err(|e| UploadError::Protocol(format!("unrecognized frame: {}", e)))?;
        if !body.is_object() {
            return Err(UploadError::Protocol(format!("unrecognized frame: {}", raw)));
        }
        return Ok(ServerMessage::Bare { code: code_of(&body) });
    };

    if BROADCAST_ACTIONS.contains(&action) {
        return Ok(ServerMessage::Broadcast(action.to_string()));
    }

    let message = match action {
        "Authorization" => ServerMessage::Authorization(serde_json::from_str::<AuthorizationReply>(body)?),
        "ClientInfo" => ServerMessage::ClientInfo,
        "FileUpload" => ServerMessage::FileUpload(serde_json::from_str::<FileUploadReply>(body)?),
        "FileUploadCheck" => {
            let body: Value = serde_json::from_str(body)?;
            ServerMessage::FileUploadCheck { code: code_of(&body) }
        }
        other => {
            let code = serde_json::from_str::<Value>(body).ok().as_ref().and_then(code_of);
            ServerMessage::Other {
                action: other.to_string(),
                code,
            }
        }
    };

    Ok(message)
}

// ============================================================================
// Binary Chunk Frames
// ============================================================================

/// Build one binary data frame
pub fn encode_chunk_frame(session_id: &str, index: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(CHUNK_MARKER.len() + session_id.len() + 4 + payload.len());
    frame.extend_from_slice(CHUNK_MARKER);
    frame.extend_from_slice(session_id.as_bytes());
    frame.extend_from_slice(&index.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Split a data frame addressed to `session_id` into index and payload
///
/// Session ids have no fixed length, so the receiver must know which one
/// it expects. Returns `None` for frames that don't match.
pub fn split_chunk_frame<'a>(frame: &'a [u8], session_id: &str) -> Option<(u32, &'a [u8])> {
    let rest = frame.strip_prefix(CHUNK_MARKER.as_slice())?;
    let rest = rest.strip_prefix(session_id.as_bytes())?;
    if rest.len() < 4 {
        return None;
    }
    let (index, payload) = rest.split_at(4);
    let index = u32::from_be_bytes([index[0], index[1], index[2], index[3]]);
    Some((index, payload))
}

// ============================================================================
// Tests
// ============================================================================
