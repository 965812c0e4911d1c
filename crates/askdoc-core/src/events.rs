//! Decoded stream event types.
//!
//! The server pushes chunked responses made of `data: <json>\n\n` frames.
//! Once a frame is reassembled and its payload decoded (see
//! `askdoc-client::event`), it becomes one of these variants. Events are
//! transient: they drive controller state and are never persisted.

use serde::Deserialize;

use crate::pipeline::PipelineStep;

/// Terminal payload of a successful query exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
    /// Chain-of-thought rationale, present in deep mode.
    #[serde(default)]
    pub thoughts: Option<String>,
    /// Server-side wall-clock seconds for the whole exchange.
    #[serde(default)]
    pub processing_time: f64,
}

/// One decoded event from a server stream.
///
/// Query streams produce `Status`/`Result`/`Error`; ingestion streams
/// produce `Step`/`Error`. The discriminants are disjoint on the wire, so
/// both streams share this union and one decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Transient progress label. Overwrites the previous one, never stored.
    Status { text: String },
    /// Terminal for a query exchange; becomes one assistant message.
    Result(QueryResult),
    /// Ingestion progress; drives the pipeline state machine.
    Step(PipelineStep),
    /// Terminal server-signaled failure for either stream kind.
    Error { message: String },
}

impl StreamEvent {
    /// Whether this event ends its exchange.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Status { .. } => false,
            Self::Result(_) => true,
            Self::Step(step) => step.is_terminal(),
            Self::Error { .. } => true,
        }
    }
}
