//! # askdoc-client
//!
//! Streaming protocol client for the askdoc document-QA service.
//!
//! This crate provides:
//! - Frame reassembly over chunked response bodies (no boundary guarantees)
//! - Typed event decoding with local recovery from malformed frames
//! - A generic, cancellable stream-consumption engine
//! - The query and ingestion stream controllers
//! - A read-through document index and a background health monitor
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use askdoc_client::{ApiClient, ClientConfig, QueryController};
//! use askdoc_core::models::QueryMode;
//! use askdoc_store::{MemoryStorage, SessionStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let api = Arc::new(ApiClient::new(ClientConfig::from_env()).unwrap());
//!     let store = Arc::new(SessionStore::open(MemoryStorage::new()).unwrap());
//!     let controller = Arc::new(QueryController::new(api, store));
//!     controller.submit("What is BM25?", QueryMode::Fast).unwrap();
//!     controller.join().await;
//! }
//! ```

pub mod api;
pub mod config;
pub mod documents;
pub mod event;
pub mod frame;
pub mod health;
pub mod ingest;
pub mod query;
pub mod stream;

pub use api::{ApiClient, QueryRequest};
pub use config::ClientConfig;
pub use documents::DocumentIndex;
pub use event::decode_frame;
pub use frame::FrameReassembler;
pub use health::HealthMonitor;
pub use ingest::{IngestController, IngestEvent};
pub use query::{ExchangePhase, QueryController, QueryEvent};
pub use stream::{consume_stream, CancelToken, HandlerFlow, StreamOutcome};
