//! Error types for askdoc.

use thiserror::Error;

/// Result type alias using askdoc's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for askdoc operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Session not found in the store
    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Server answered with a non-success status code
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Request or stream read exceeded the configured deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The server signaled an error event inside a stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}
