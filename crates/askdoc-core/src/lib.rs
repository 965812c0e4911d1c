//! # askdoc-core
//!
//! Core types and abstractions shared by the askdoc client crates.
//!
//! This crate provides:
//! - The session/message data model
//! - Decoded stream event types for the server's chunked responses
//! - The document ingestion pipeline state machine
//! - The shared error type and structured-logging field constants

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod pipeline;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{QueryResult, StreamEvent};
pub use models::{Message, QueryMode, Role, Session, UploadState, UploadTask};
pub use pipeline::{advance, step_status, PipelineStep, StepStatus};
