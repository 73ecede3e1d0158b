//! REST client for the sync service's read side

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::VerifierConfig;
use crate::error::{Result, UploadError};
use crate::protocol::CODE_SUCCESS;
use crate::upload::FileInfoSource;

/// `GET /api/file/info` response envelope
#[derive(Debug, Deserialize)]
struct FileInfoResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Option<FileInfoData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfoData {
    #[serde(default)]
    content_hash: Option<Value>,
}

/// Queries stored file metadata over HTTP
#[derive(Clone)]
pub struct FileInfoClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl FileInfoClient {
    pub fn new(base_url: &str, token: &str, config: &VerifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl FileInfoSource for FileInfoClient {
    async fn content_hash(&self, vault: &str, path: &str) -> Result<Option<String>> {
        let url = format!("{}/api/file/info", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("vault", vault), ("path", path)])
            .header("token", &self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Network(format!("file info returned {}: {}", status, body)));
        }

        let info: FileInfoResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Protocol(format!("Failed to parse file info: {}", e)))?;

        if info.code != CODE_SUCCESS {
            return Ok(None);
        }

        match info.data.and_then(|d| d.content_hash) {
            Some(Value::String(hash)) => Ok(Some(hash)),
            Some(Value::Number(hash)) => Ok(Some(hash.to_string())),
            Some(other) => Err(UploadError::Protocol(format!("unexpected contentHash: {}", other))),
            None => Err(UploadError::Protocol("file info without contentHash".to_string())),
        }
    }
}
