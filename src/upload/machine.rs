//! Upload Session State Machine
//!
//! Pure transition logic for one upload attempt. The machine never touches
//! the socket: the driver feeds it [`Event`]s and carries out the
//! [`Effect`]s it returns.
//!
//! ```text
//! Connecting --Connected--> Authenticating --Authorization ok--> AwaitingCheck
//! AwaitingCheck --ClientInfo--> (send FileUploadCheck) AwaitingCheck
//! AwaitingCheck --FileUpload no-update--> Done
//! AwaitingCheck --FileUpload sessionId--> Uploading --ChunksSent--> AwaitingCompletion
//! AwaitingCompletion --success code--> Done
//! AwaitingCompletion --grace elapsed / closed--> Verifying
//! Verifying --Verified ok--> Done
//! Verifying --Verified err--> Failed
//! any --error--> Failed
//! ```

use super::chunker::TransmitReport;
use super::types::{SessionOutcome, SessionState};
use crate::error::{Result, UploadError};
use crate::hash::Fingerprint;
use crate::protocol::{is_completion_code, ClientFrame, ClientInfo, FileUploadCheck, ServerMessage};

/// Input to the machine
#[derive(Debug, Clone)]
pub enum Event {
    /// Transport established
    Connected,
    Message(ServerMessage),
    /// The transmitter finished sending every chunk
    ChunksSent(TransmitReport),
    /// Grace interval after the last chunk expired
    GraceElapsed,
    /// The server closed the socket
    Closed,
    /// Read-side check finished
    Verified(Result<()>),
    /// Transport, parse or local I/O failure
    Failed(UploadError),
}

/// Work the driver must perform
#[derive(Debug, Clone)]
pub enum Effect {
    Send(ClientFrame),
    /// Stream the file as binary frames, then report `ChunksSent`
    TransmitChunks { session_id: String, chunk_size: usize },
    /// Start the grace timer
    ArmGrace,
    Close,
    /// Read back the stored fingerprint, then report `Verified`
    Verify {
        vault: String,
        path: String,
        expected: Fingerprint,
    },
    /// The socket phase is over
    Finish(SessionOutcome),
}

/// State machine for one upload session
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    token: String,
    client: ClientInfo,
    check: FileUploadCheck,
    default_chunk_size: usize,
    session_id: Option<String>,
    chunks: u32,
}

impl SessionMachine {
    pub fn new(token: String, client: ClientInfo, check: FileUploadCheck, default_chunk_size: usize) -> Self {
        Self {
            state: SessionState::Connecting,
            token,
            client,
            check,
            default_chunk_size,
            session_id: None,
            chunks: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Server-assigned session identifier, once issued
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Advance the machine by one event
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        match event {
            Event::Failed(error) => self.fail(error),
            Event::Connected => self.on_connected(),
            Event::Message(message) => self.on_message(message),
            Event::ChunksSent(report) => self.on_chunks_sent(report),
            Event::GraceElapsed => self.on_grace_elapsed(),
            Event::Closed => self.on_closed(),
            Event::Verified(result) => self.on_verified(result),
        }
    }

    fn on_connected(&mut self) -> Vec<Effect> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        self.state = SessionState::Authenticating;
        vec![Effect::Send(ClientFrame::Authorization(self.token.clone()))]
    }

    fn on_message(&mut self, message: ServerMessage) -> Vec<Effect> {
        match (self.state, message) {
            (_, ServerMessage::Broadcast(action)) => {
                tracing::trace!(action = %action, "Ignoring broadcast");
                Vec::new()
            }

            (SessionState::Authenticating, ServerMessage::Authorization(reply)) => {
                if reply.status {
                    self.state = SessionState::AwaitingCheck;
                    vec![Effect::Send(ClientFrame::ClientInfo(self.client.clone()))]
                } else {
                    let reason = reply.message.unwrap_or_else(|| "rejected by server".to_string());
                    self.fail(UploadError::Authentication(reason))
                }
            }

            (SessionState::AwaitingCheck, ServerMessage::ClientInfo) => {
                vec![Effect::Send(ClientFrame::FileUploadCheck(self.check.clone()))]
            }

            (SessionState::AwaitingCheck, ServerMessage::FileUploadCheck { code }) => match code {
                Some(code) if is_completion_code(code) => self.finish_unchanged(),
                _ => Vec::new(),
            },

            (SessionState::AwaitingCheck, ServerMessage::FileUpload(reply)) => {
                if let Some(session_id) = reply.session_id().map(str::to_string) {
                    // Chunk frames carry the id as raw ASCII
                    if !session_id.is_ascii() {
                        return self.fail(UploadError::Protocol(format!(
                            "session id is not ASCII: {:?}",
                            session_id
                        )));
                    }
                    let chunk_size = reply.chunk_size_or(self.default_chunk_size);
                    self.session_id = Some(session_id.clone());
                    self.state = SessionState::Uploading;
                    vec![Effect::TransmitChunks { session_id, chunk_size }]
                } else if is_completion_code(reply.code) {
                    self.finish_unchanged()
                } else {
                    let mut reason = format!("upload reply without session id (code {})", reply.code);
                    if let Some(message) = reply.message {
                        reason.push_str(": ");
                        reason.push_str(&message);
                    }
                    self.fail(UploadError::Protocol(reason))
                }
            }

            (SessionState::AwaitingCompletion, message) => match message.code() {
                Some(code) if is_completion_code(code) => {
                    self.state = SessionState::Done;
                    vec![
                        Effect::Close,
                        Effect::Finish(SessionOutcome::Completed { chunks: self.chunks }),
                    ]
                }
                _ => Vec::new(),
            },

            (state, message) => {
                tracing::debug!(state = ?state, message = ?message, "Ignoring unexpected message");
                Vec::new()
            }
        }
    }

    fn on_chunks_sent(&mut self, report: TransmitReport) -> Vec<Effect> {
        if self.state != SessionState::Uploading {
            return Vec::new();
        }
        self.chunks = report.chunks;
        self.state = SessionState::AwaitingCompletion;
        vec![Effect::ArmGrace]
    }

    fn on_grace_elapsed(&mut self) -> Vec<Effect> {
        if self.state != SessionState::AwaitingCompletion {
            return Vec::new();
        }
        self.state = SessionState::Verifying;
        vec![Effect::Close, self.verify()]
    }

    fn on_closed(&mut self) -> Vec<Effect> {
        match self.state {
            SessionState::AwaitingCompletion => {
                self.state = SessionState::Verifying;
                return vec![self.verify()];
            }
            // We closed it ourselves
            SessionState::Verifying => return Vec::new(),
            _ => {}
        }
        self.state = SessionState::Failed;
        vec![Effect::Finish(SessionOutcome::Failed(UploadError::Network(
            "connection closed by server".to_string(),
        )))]
    }

    fn on_verified(&mut self, result: Result<()>) -> Vec<Effect> {
        if self.state != SessionState::Verifying {
            return Vec::new();
        }
        match result {
            Ok(()) => {
                self.state = SessionState::Done;
                vec![Effect::Finish(SessionOutcome::Verified { chunks: self.chunks })]
            }
            Err(error) => {
                self.state = SessionState::Failed;
                vec![Effect::Finish(SessionOutcome::Failed(error))]
            }
        }
    }

    fn verify(&self) -> Effect {
        Effect::Verify {
            vault: self.check.vault.clone(),
            path: self.check.path.clone(),
            expected: self.check.content_hash,
        }
    }

    fn finish_unchanged(&mut self) -> Vec<Effect> {
        self.state = SessionState::Done;
        vec![Effect::Close, Effect::Finish(SessionOutcome::Unchanged)]
    }

    fn fail(&mut self, error: UploadError) -> Vec<Effect> {
        self.state = SessionState::Failed;
        vec![Effect::Close, Effect::Finish(SessionOutcome::Failed(error))]
    }
}

// ============================================================================
// Tests
// ============================================================================
