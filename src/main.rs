//! note-sync-upload
//!
//! Uploads the files named on the command line into a vault and prints a
//! JSON array of per-file results on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use note_sync_uploader::{Config, Uploader};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing; stdout is reserved for the result document
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "note_sync_uploader=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("FAST_NOTE_URL and FAST_NOTE_TOKEN must be set: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if files.is_empty() {
        tracing::warn!("No files given");
    }

    tracing::info!("Starting note-sync-upload v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Server: {}", config.server.base_url);
    tracing::info!("Vault: {}", config.upload.vault);

    let uploader = Uploader::from_config(&config).context("Failed to build HTTP client")?;
    let report = uploader.upload_batch(&files).await;

    let output = serde_json::to_string_pretty(&report).context("Failed to encode results")?;
    println!("{}", output);

    Ok(ExitCode::from(report.exit_code(config.upload.strict_exit)))
}
