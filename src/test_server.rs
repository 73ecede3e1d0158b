//! In-process mock of the sync service for tests
//!
//! Serves the sync socket and the file info endpoint on an ephemeral port
//! and records what clients sent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::hash::content_fingerprint;
use crate::protocol::split_chunk_frame;

/// Knobs for the mock's server-side behaviour
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Record frames but never reply
    pub silent: bool,
    /// Send `{"code":1}` once every byte arrived
    pub ack_uploads: bool,
    pub chunk_size: usize,
    /// Reply to the upload check without a session id
    pub omit_session_id: bool,
    /// Report `contentHash` as a JSON number
    pub numeric_hashes: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            silent: false,
            ack_uploads: true,
            chunk_size: 64 * 1024,
            omit_session_id: false,
            numeric_hashes: false,
        }
    }
}

#[derive(Default)]
struct Records {
    actions: Vec<String>,
    /// (vault, path) -> content hash
    stored: HashMap<(String, String), String>,
    bytes: HashMap<String, Vec<u8>>,
    chunks: HashMap<String, Vec<u32>>,
    info_requests: usize,
    pings: usize,
    sessions_issued: u32,
}

struct MockState {
    behavior: MockBehavior,
    records: Mutex<Records>,
}

struct PendingUpload {
    session_id: String,
    vault: String,
    path: String,
    size: u64,
    received: Vec<u8>,
}

#[derive(Clone)]
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockServer {
    pub const TOKEN: &'static str = "test-token";

    pub async fn start(behavior: MockBehavior) -> Self {
        let state = Arc::new(MockState {
            behavior,
            records: Mutex::new(Records::default()),
        });

        let app = Router::new()
            .route("/api/user/sync", get(sync_socket))
            .route("/api/file/info", get(file_info))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Pretend the server already holds content with `hash`
    pub fn store(&self, vault: &str, path: &str, hash: &str) {
        let mut records = self.state.records.lock().unwrap();
        records.stored.insert((vault.to_string(), path.to_string()), hash.to_string());
    }

    /// Text-frame actions received, in order
    pub fn actions(&self) -> Vec<String> {
        self.state.records.lock().unwrap().actions.clone()
    }

    pub fn chunk_indices(&self, path: &str) -> Vec<u32> {
        let records = self.state.records.lock().unwrap();
        records.chunks.get(path).cloned().unwrap_or_default()
    }

    pub fn stored_bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.state.records.lock().unwrap().bytes.get(path).cloned()
    }

    pub fn info_requests(&self) -> usize {
        self.state.records.lock().unwrap().info_requests
    }

    /// Ping frames received across all sockets
    pub fn pings(&self) -> usize {
        self.state.records.lock().unwrap().pings
    }
}

// ============================================================================
// Sync Socket
// ============================================================================

async fn sync_socket(ws: WebSocketUpgrade, State(state): State<Arc<MockState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<MockState>) {
    let mut upload: Option<PendingUpload> = None;

    while let Some(Ok(message)) = socket.recv().await {
        let replies = match message {
            Message::Text(text) => state.on_text(&text, &mut upload),
            Message::Binary(frame) => state.on_binary(&frame, &mut upload),
            Message::Ping(_) => {
                // axum answers with a pong on its own
                state.records.lock().unwrap().pings += 1;
                Vec::new()
            }
            Message::Close(_) => break,
            _ => Vec::new(),
        };

        for reply in replies {
            if socket.send(Message::Text(reply)).await.is_err() {
                return;
            }
        }
    }
}

impl MockState {
    fn on_text(&self, text: &str, upload: &mut Option<PendingUpload>) -> Vec<String> {
        let (action, body) = text.split_once('|').unwrap_or((text, ""));
        let mut records = self.records.lock().unwrap();
        records.actions.push(action.to_string());

        if self.behavior.silent {
            return Vec::new();
        }

        match action {
            "Authorization" if body == MockServer::TOKEN => {
                vec![r#"Authorization|{"status":true}"#.to_string()]
            }
            "Authorization" => {
                vec![r#"Authorization|{"status":false,"message":"invalid token"}"#.to_string()]
            }
            "ClientInfo" => vec![
                r#"FileSyncUpdate|{"path":"elsewhere.md"}"#.to_string(),
                r#"ClientInfo|{"code":1}"#.to_string(),
            ],
            "FileUploadCheck" => {
                let check: Value = serde_json::from_str(body).unwrap_or_default();
                let vault = check["vault"].as_str().unwrap_or_default().to_string();
                let path = check["path"].as_str().unwrap_or_default().to_string();
                let content_hash = check["contentHash"].as_str().unwrap_or_default().to_string();
                let size = check["size"].as_u64().unwrap_or(0);

                if records.stored.get(&(vault.clone(), path.clone())) == Some(&content_hash) {
                    return vec![r#"FileUpload|{"code":6}"#.to_string()];
                }
                if self.behavior.omit_session_id {
                    return vec![r#"FileUpload|{"code":5,"message":"busy"}"#.to_string()];
                }

                records.sessions_issued += 1;
                let session_id = format!("sess-{}", records.sessions_issued);
                records.chunks.insert(path.clone(), Vec::new());

                let mut replies = vec![format!(
                    "FileUpload|{}",
                    json!({"code": 1, "data": {"sessionId": session_id, "chunkSize": self.behavior.chunk_size}})
                )];

                let pending = PendingUpload {
                    session_id,
                    vault,
                    path,
                    size,
                    received: Vec::new(),
                };
                if size == 0 {
                    replies.extend(self.complete(&mut records, pending));
                } else {
                    *upload = Some(pending);
                }
                replies
            }
            _ => Vec::new(),
        }
    }

    fn on_binary(&self, frame: &[u8], upload: &mut Option<PendingUpload>) -> Vec<String> {
        let Some(pending) = upload.as_mut() else {
            return Vec::new();
        };
        let Some((index, payload)) = split_chunk_frame(frame, &pending.session_id) else {
            return Vec::new();
        };

        let mut records = self.records.lock().unwrap();
        records.chunks.entry(pending.path.clone()).or_default().push(index);
        pending.received.extend_from_slice(payload);

        if pending.received.len() as u64 >= pending.size {
            if let Some(done) = upload.take() {
                return self.complete(&mut records, done);
            }
        }
        Vec::new()
    }

    fn complete(&self, records: &mut Records, upload: PendingUpload) -> Vec<String> {
        let hash = content_fingerprint(&upload.received).to_string();
        records.stored.insert((upload.vault, upload.path.clone()), hash);
        records.bytes.insert(upload.path, upload.received);

        if self.behavior.ack_uploads {
            vec![r#"{"code":1}"#.to_string()]
        } else {
            Vec::new()
        }
    }
}

// ============================================================================
// File Info Endpoint
// ============================================================================

#[derive(Deserialize)]
struct InfoQuery {
    vault: String,
    path: String,
}

async fn file_info(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<InfoQuery>,
) -> Response {
    let mut records = state.records.lock().unwrap();
    records.info_requests += 1;

    if headers.get("token").and_then(|v| v.to_str().ok()) != Some(MockServer::TOKEN) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }

    match records.stored.get(&(query.vault, query.path)) {
        Some(hash) => {
            let value = if state.behavior.numeric_hashes {
                json!(hash.parse::<i64>().unwrap_or_default())
            } else {
                json!(hash)
            };
            Json(json!({"code": 1, "data": {"contentHash": value}})).into_response()
        }
        None => Json(json!({"code": 0, "message": "file not found"})).into_response(),
    }
}
