//! Centralized default constants for the askdoc client.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// SERVER
// =============================================================================

/// Default base URL of the document-QA service.
pub const BASE_URL: &str = "http://localhost:8000";

/// Request timeout in seconds. Covers the whole exchange including the
/// streamed body, so it has to accommodate deep-mode generation.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// QUERY
// =============================================================================

/// Number of chunks the server retrieves per question (server default).
pub const TOP_K: usize = 4;

/// Maximum characters of the first user message used for a session title.
pub const TITLE_MAX_CHARS: usize = 30;

// =============================================================================
// HEALTH
// =============================================================================

/// Interval between liveness probes in seconds.
pub const HEALTH_POLL_INTERVAL_SECS: u64 = 30;

/// Timeout for a single liveness probe in seconds.
pub const HEALTH_PROBE_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Fixed key under which the whole session collection is persisted.
pub const SESSIONS_KEY: &str = "askdoc_sessions";

/// Title given to a freshly created session before the first user message.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";
