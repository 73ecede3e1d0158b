//! Upload Session Driver
//!
//! Runs one [`SessionMachine`] against a live WebSocket:
//! - The socket loop, and any read-side verification, run on a spawned task
//! - The caller waits on a oneshot channel bounded by the session timeout
//! - On timeout the task is aborted, which drops and closes the socket
//!
//! The session timeout is the ceiling for the whole file, verification
//! backoffs included.
//!
//! The oneshot is the only state shared between the two sides, so a frame
//! arriving at the last moment either wins the race or is discarded.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::chunker::{transmit_file, WsFrameSink};
use super::machine::{Effect, Event, SessionMachine};
use super::types::{FileDescriptor, SessionOutcome, UploadTarget};
use super::verifier::{CompletionVerifier, FileInfoSource};
use crate::config::SessionTiming;
use crate::error::UploadError;
use crate::protocol::{parse_server_frame, ClientInfo};

// ============================================================================
// Session Runner
// ============================================================================

/// Opens one socket per file and drives it to a final outcome
pub struct SessionRunner<S> {
    inner: Arc<SessionRunnerInner<S>>,
}

struct SessionRunnerInner<S> {
    sync_url: String,
    token: String,
    client: ClientInfo,
    timing: SessionTiming,
    verifier: CompletionVerifier<S>,
}

impl<S> Clone for SessionRunner<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: FileInfoSource + 'static> SessionRunner<S> {
    pub fn new(
        sync_url: String,
        token: String,
        client: ClientInfo,
        timing: SessionTiming,
        verifier: CompletionVerifier<S>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionRunnerInner {
                sync_url,
                token,
                client,
                timing,
                verifier,
            }),
        }
    }

    pub fn timing(&self) -> &SessionTiming {
        &self.inner.timing
    }

    /// Upload one file over a fresh connection, verifying if unacknowledged
    pub async fn run(&self, descriptor: &FileDescriptor, target: &UploadTarget) -> SessionOutcome {
        let machine = SessionMachine::new(
            self.inner.token.clone(),
            self.inner.client.clone(),
            descriptor.upload_check(target),
            self.inner.timing.default_chunk_size,
        );

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let local_path = descriptor.local_path.clone();

        let task = tokio::spawn(async move {
            let outcome = connect_and_drive(&inner, machine, local_path).await;
            let _ = tx.send(outcome);
        });

        let limit = self.inner.timing.session_timeout;
        let outcome = match tokio::time::timeout(limit, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => SessionOutcome::Failed(UploadError::Network(
                "session ended without an outcome".to_string(),
            )),
            Err(_) => {
                tracing::warn!(vault = %target.vault, path = %target.path, ?limit, "Upload session timed out");
                SessionOutcome::Failed(UploadError::Timeout(limit))
            }
        };

        // Force close; a no-op once the task has finished
        task.abort();

        outcome
    }
}

async fn connect_and_drive<S: FileInfoSource>(
    inner: &SessionRunnerInner<S>,
    machine: SessionMachine,
    local_path: PathBuf,
) -> SessionOutcome {
    let (ws, _response) = match tokio_tungstenite::connect_async(inner.sync_url.as_str()).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!(url = %inner.sync_url, error = %e, "Failed to connect to sync socket");
            return SessionOutcome::Failed(e.into());
        }
    };

    drive(ws, machine, &local_path, &inner.timing, &inner.verifier).await
}

// ============================================================================
// Socket Loop
// ============================================================================

/// Feed socket events to the machine and execute its effects
async fn drive<W, S>(
    ws: W,
    mut machine: SessionMachine,
    local_path: &Path,
    timing: &SessionTiming,
    verifier: &CompletionVerifier<S>,
) -> SessionOutcome
where
    W: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send,
    S: FileInfoSource,
{
    let (mut sink, mut stream) = ws.split();
    let mut events = VecDeque::from([Event::Connected]);
    let mut grace_deadline: Option<Instant> = None;

    let mut keepalive = tokio::time::interval_at(Instant::now() + timing.ping_interval, timing.ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        while let Some(event) = events.pop_front() {
            for effect in machine.handle(event) {
                match effect {
                    Effect::Send(frame) => {
                        tracing::debug!(action = frame.action().as_str(), "Sending frame");
                        let sent = match frame.encode() {
                            Ok(text) => sink.send(Message::Text(text)).await.map_err(UploadError::from),
                            Err(e) => Err(e),
                        };
                        if let Err(e) = sent {
                            events.push_back(Event::Failed(e));
                        }
                    }
                    Effect::TransmitChunks { session_id, chunk_size } => {
                        tracing::info!(session_id = %session_id, chunk_size, "Upload session opened");
                        let mut frames = WsFrameSink::new(&mut sink);
                        match transmit_file(&mut frames, &session_id, chunk_size, local_path).await {
                            Ok(report) => events.push_back(Event::ChunksSent(report)),
                            Err(e) => events.push_back(Event::Failed(e)),
                        }
                    }
                    Effect::ArmGrace => {
                        grace_deadline = Some(Instant::now() + timing.grace_interval);
                    }
                    Effect::Close => {
                        let _ = sink.close().await;
                    }
                    Effect::Verify { vault, path, expected } => {
                        tracing::debug!(vault = %vault, path = %path, "No upload ack, verifying");
                        let result = verifier.verify(&vault, &path, expected).await;
                        events.push_back(Event::Verified(result));
                    }
                    Effect::Finish(outcome) => {
                        tracing::debug!(state = ?machine.state(), outcome = ?outcome, "Socket phase finished");
                        return outcome;
                    }
                }
            }
        }

        let grace = async move {
            match grace_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => match parse_server_frame(&text) {
                    Ok(message) => events.push_back(Event::Message(message)),
                    Err(e) => events.push_back(Event::Failed(e)),
                },
                Some(Ok(Message::Close(_))) | None => events.push_back(Event::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => events.push_back(Event::Failed(e.into())),
            },
            _ = grace => events.push_back(Event::GraceElapsed),
            _ = keepalive.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    events.push_back(Event::Failed(e.into()));
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
