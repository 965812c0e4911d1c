//! Data model for sessions, messages, and upload tasks.
//!
//! `Session` and `Message` are the persisted conversation log; both serialize
//! with camelCase field names to stay record-compatible with earlier clients.
//! `UploadTask` is an ephemeral projection of one in-flight ingestion and is
//! never persisted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::pipeline::PipelineStep;

// =============================================================================
// MESSAGES
// =============================================================================

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Answer generation mode requested from the server.
///
/// `Deep` routes the question through chain-of-thought generation and may
/// return rationale in `Message::thoughts`; `Fast` skips it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Fast,
    #[default]
    Deep,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Deep => write!(f, "deep"),
        }
    }
}

/// One entry in a session's append-only message log.
///
/// Messages are immutable once appended; a regenerated answer is a new
/// `Message`, never an edit of an old one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Source snippets the answer was grounded on (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    /// Mode the exchange was requested with (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<QueryMode>,
    /// Chain-of-thought rationale, present for deep-mode answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    /// Server-reported processing time for the exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_seconds: Option<f64>,
}

impl Message {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            sources: None,
            mode: None,
            thoughts: None,
            latency_seconds: None,
        }
    }

    /// Build a plain assistant message (used for failure notices).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            sources: None,
            mode: None,
            thoughts: None,
            latency_seconds: None,
        }
    }
}

// =============================================================================
// SESSIONS
// =============================================================================

/// One conversation: an ordered, append-only message log with a title.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Creation-time-derived unique identifier (UUIDv7).
    pub id: Uuid,
    /// Auto-derived from the first user message; renameable.
    pub title: String,
    pub messages: Vec<Message>,
    pub created_date: String,
}

impl Session {
    /// Create a fresh default session.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            title: defaults::DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_date: Utc::now().format("%Y-%m-%d").to_string(),
        }
    }

    /// Whether the title has never been derived or renamed.
    pub fn has_default_title(&self) -> bool {
        self.title == defaults::DEFAULT_SESSION_TITLE
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a session title from the first user message.
///
/// Truncates on a character boundary and appends an ellipsis when the
/// question is longer than the limit.
pub fn derive_title(question: &str) -> String {
    let trimmed = question.trim();
    if trimmed.chars().count() <= defaults::TITLE_MAX_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(defaults::TITLE_MAX_CHARS).collect();
        format!("{}...", head.trim_end())
    }
}

// =============================================================================
// UPLOAD TASKS
// =============================================================================

/// Lifecycle of one upload slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
}

/// Ephemeral progress snapshot of one in-flight document upload.
///
/// Exists only for the duration of the exchange; on success the uploaded
/// document is re-read from the server's document list instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub file_name: String,
    pub state: UploadState,
    pub current_step: PipelineStep,
}

impl UploadTask {
    /// Fresh task for a file about to be uploaded.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            state: UploadState::Idle,
            current_step: PipelineStep::Idle,
        }
    }
}
