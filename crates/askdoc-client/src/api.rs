//! HTTP boundary with the document-QA service.
//!
//! Thin request-building layer: endpoints, payload shapes, and non-2xx
//! handling live here; everything streaming-related lives in the stream
//! engine and the controllers.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use askdoc_core::events::QueryResult;
use askdoc_core::models::QueryMode;
use askdoc_core::{Error, Result};

use crate::config::ClientConfig;

/// Request payload for `/query` and `/query/stream`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub question: String,
    pub top_k: usize,
    pub mode: QueryMode,
}

/// Response payload of the non-streaming `/query` endpoint.
#[derive(Debug, Deserialize)]
struct AnswerResponse {
    answer: String,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    thoughts: Option<String>,
    #[serde(default)]
    processing_time: f64,
}

/// HTTP client for the document-QA service.
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %config.base_url, "initializing askdoc client");
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Open the streamed query exchange. Returns the raw response; the
    /// caller drives the body through the stream engine.
    pub async fn query_stream(&self, request: &QueryRequest) -> Result<reqwest::Response> {
        debug!(top_k = request.top_k, mode = %request.mode, "opening query stream");
        let response = self
            .client
            .post(self.url("/query/stream"))
            .json(request)
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    /// One-shot query without incremental status (server `/query`).
    pub async fn query_once(&self, request: &QueryRequest) -> Result<QueryResult> {
        let response = self
            .client
            .post(self.url("/query"))
            .json(request)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let answer: AnswerResponse = response.json().await?;
        Ok(QueryResult {
            answer: answer.answer,
            sources: answer.sources,
            thoughts: answer.thoughts,
            processing_time: answer.processing_time,
        })
    }

    /// Open the streamed upload exchange (multipart `/documents/upload`).
    pub async fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<reqwest::Response> {
        debug!(file_name, size = content.len(), "opening upload stream");
        let part = reqwest::multipart::Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| Error::InvalidInput(format!("Invalid upload part: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/documents/upload"))
            .multipart(form)
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    /// Current list of ingested document names.
    pub async fn list_documents(&self) -> Result<Vec<String>> {
        let response = self.client.get(self.url("/documents")).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Remove one ingested document by name.
    pub async fn delete_document(&self, name: &str) -> Result<()> {
        let encoded = urlencoding::encode(name);
        let response = self
            .client
            .delete(self.url(&format!("/documents/delete_file/{}", encoded)))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Liveness probe: any 2xx means online. Never errors; probe failures
    /// are an offline verdict, not a fault.
    pub async fn health(&self) -> bool {
        let result = self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(
                askdoc_core::defaults::HEALTH_PROBE_TIMEOUT_SECS,
            ))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "health check error");
                false
            }
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "no response body".to_string());
        Err(Error::Status {
            status: status.as_u16(),
            message,
        })
    }
}
