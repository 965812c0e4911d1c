//! Client configuration.

use askdoc_core::defaults;

/// Configuration for the askdoc service client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the document-QA service.
    pub base_url: String,
    /// Request timeout in seconds. Bounds the whole exchange including the
    /// streamed body; a stalled stream surfaces as a timeout failure.
    pub timeout_seconds: u64,
    /// Number of chunks the server should retrieve per question.
    pub top_k: usize,
    /// Liveness poll interval in seconds.
    pub health_poll_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECS,
            top_k: defaults::TOP_K,
            health_poll_interval_secs: defaults::HEALTH_POLL_INTERVAL_SECS,
        }
    }
}

impl ClientConfig {
    /// Create from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ASKDOC_BASE_URL` | `http://localhost:8000` | Service endpoint |
    /// | `ASKDOC_TIMEOUT` | `300` | Request timeout (seconds) |
    /// | `ASKDOC_TOP_K` | `4` | Retrieval depth per question |
    /// | `ASKDOC_HEALTH_INTERVAL` | `30` | Liveness poll interval (seconds) |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ASKDOC_BASE_URL")
                .unwrap_or_else(|_| defaults::BASE_URL.to_string()),
            timeout_seconds: std::env::var("ASKDOC_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::REQUEST_TIMEOUT_SECS),
            top_k: std::env::var("ASKDOC_TOP_K")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::TOP_K),
            health_poll_interval_secs: std::env::var("ASKDOC_HEALTH_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::HEALTH_POLL_INTERVAL_SECS),
        }
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the retrieval depth.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}
