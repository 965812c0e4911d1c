//! Structured logging field name constants for askdoc.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Exchange failed, user-visible error produced |
//! | WARN  | Recoverable issue (malformed frame, corrupt persisted state) |
//! | INFO  | Lifecycle events (exchange start/finish, upload complete) |
//! | DEBUG | Decision points (dropped events, stale steps, guards) |
//! | TRACE | Per-frame/per-chunk iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "client", "store", "health"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "frame", "decoder", "query", "ingest", "documents"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "cancel", "upload", "persist", "restore"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Session UUID being operated on.
pub const SESSION_ID: &str = "session_id";

/// Message UUID being appended.
pub const MESSAGE_ID: &str = "message_id";

/// File name of an upload or managed document.
pub const FILE_NAME: &str = "file_name";

/// Pipeline step name reported by the server.
pub const STEP: &str = "step";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of complete frames produced from one chunk.
pub const FRAME_COUNT: &str = "frame_count";

/// Byte length of a received chunk.
pub const CHUNK_LEN: &str = "chunk_len";

/// Server-reported processing time in seconds.
pub const PROCESSING_TIME: &str = "processing_time";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
