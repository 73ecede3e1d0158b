//! Attachment Upload Module
//!
//! Pushes local files into a vault over the sync socket with:
//! - Fingerprint negotiation so unchanged content is never re-sent
//! - Fixed-size binary chunks tagged with the server's session id
//! - Read-side verification when the server never acknowledges
//!
//! Session Flow:
//! 1. Authenticate with the bearer token
//! 2. Announce the client, then send the upload check
//! 3. Server answers "already present" or issues a session
//! 4. Client streams chunks and waits briefly for a success code
//! 5. Without one, the file info endpoint decides the outcome

pub mod chunker;
pub mod machine;
pub mod orchestrator;
pub mod session;
pub mod types;
pub mod verifier;

pub use chunker::{transmit, transmit_file, FrameSink, TransmitReport, WsFrameSink};
pub use machine::{Effect, Event, SessionMachine};
pub use orchestrator::Uploader;
pub use session::SessionRunner;
pub use types::*;
pub use verifier::{CompletionVerifier, FileInfoSource};
