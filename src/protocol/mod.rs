//! Sync Protocol
//!
//! Wire format of the vault sync socket:
//! - Text frames `<action>|<json-body>` for the handshake and negotiation
//! - Bare JSON `{code}` frames some server revisions send without an action
//! - Binary data frames carrying file chunks
//!
//! Handshake:
//! 1. `Authorization|<token>` -> `Authorization|{status, message?}`
//! 2. `ClientInfo|{...}` -> `ClientInfo|...`
//! 3. `FileUploadCheck|{...}` -> `FileUpload|{code, data?: {sessionId, chunkSize}}`
//! 4. Binary chunks, then possibly a success code

pub mod codec;
pub mod types;

pub use codec::{encode_chunk_frame, parse_server_frame, split_chunk_frame, ClientFrame, CHUNK_MARKER};
pub use types::*;
