//! Note Sync Uploader
//!
//! Client for uploading local attachments into a Fast Note Sync vault over
//! its WebSocket sync protocol, with HTTP read-back when the server stays
//! quiet about completion.

pub mod api;
pub mod config;
pub mod error;
pub mod hash;
pub mod protocol;
pub mod upload;

#[cfg(test)]
mod test_server;

pub use config::Config;
pub use error::{Result, UploadError};
pub use upload::{BatchReport, UploadResult, Uploader};
