//! Configuration management for the uploader

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::protocol::ClientInfo;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub timing: SessionTiming,
    pub verify: VerifierConfig,
    pub client: ClientIdentity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP(S) base URL of the sync service
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub vault: String,
    /// Vault-relative directory the files land in; empty for the vault root
    pub prefix: String,
    /// Exit non-zero when any file in the batch failed
    pub strict_exit: bool,
}

/// Timers governing one upload session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTiming {
    /// Absolute ceiling for the socket phase of one file
    pub session_timeout: Duration,
    /// Wait for an explicit ack after the last chunk
    pub grace_interval: Duration,
    pub ping_interval: Duration,
    /// Pause between consecutive files
    pub between_files: Duration,
    /// Used when the server doesn't negotiate a chunk size
    pub default_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    pub attempts: u32,
    pub backoff: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
    pub client_type: String,
    pub offline_sync_strategy: String,
}

impl ClientIdentity {
    pub fn to_client_info(&self) -> ClientInfo {
        ClientInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            client_type: self.client_type.clone(),
            offline_sync_strategy: self.offline_sync_strategy.clone(),
        }
    }
}

impl Default for SessionTiming {
    fn default() -> Self {
        SessionTiming {
            session_timeout: Duration::from_secs(60),
            grace_interval: Duration::from_secs(3),
            ping_interval: Duration::from_secs(25),
            between_files: Duration::from_secs(1),
            default_chunk_size: 512 * 1024,
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            attempts: 3,
            backoff: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        ClientIdentity {
            name: "UploadScript".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            client_type: "desktop".to_string(),
            offline_sync_strategy: "newTimeMerge".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                base_url: "http://localhost:4000".to_string(),
                token: String::new(),
            },
            upload: UploadConfig {
                vault: "Obsidian".to_string(),
                prefix: String::new(),
                strict_exit: false,
            },
            timing: SessionTiming::default(),
            verify: VerifierConfig::default(),
            client: ClientIdentity::default(),
        }
    }
}

fn millis_var(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn flag_var(name: &str) -> bool {
    matches!(
        env::var(name).unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let timing = SessionTiming::default();
        let verify = VerifierConfig::default();

        Ok(Config {
            server: ServerConfig {
                base_url: env::var("FAST_NOTE_URL")?,
                token: env::var("FAST_NOTE_TOKEN")?,
            },
            upload: UploadConfig {
                vault: env::var("FAST_NOTE_VAULT").unwrap_or_else(|_| "Obsidian".to_string()),
                prefix: env::var("FAST_NOTE_PREFIX").unwrap_or_default(),
                strict_exit: flag_var("FAST_NOTE_STRICT_EXIT"),
            },
            timing: SessionTiming {
                session_timeout: millis_var("FAST_NOTE_SESSION_TIMEOUT_MS", timing.session_timeout),
                grace_interval: millis_var("FAST_NOTE_GRACE_MS", timing.grace_interval),
                ping_interval: millis_var("FAST_NOTE_PING_MS", timing.ping_interval),
                between_files: millis_var("FAST_NOTE_BETWEEN_FILES_MS", timing.between_files),
                default_chunk_size: timing.default_chunk_size,
            },
            verify: VerifierConfig {
                attempts: verify.attempts,
                backoff: millis_var("FAST_NOTE_VERIFY_BACKOFF_MS", verify.backoff),
                request_timeout: millis_var("FAST_NOTE_VERIFY_TIMEOUT_MS", verify.request_timeout),
            },
            client: ClientIdentity::default(),
        })
    }

    /// WebSocket endpoint derived from the HTTP base URL
    pub fn sync_url(&self) -> String {
        sync_url(&self.server.base_url)
    }
}

/// `http://host` -> `ws://host/api/user/sync`, `https` -> `wss`
pub fn sync_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/api/user/sync", ws)
}
