//! Query stream controller.
//!
//! Owns one in-flight question/answer exchange at a time. The user's message
//! is appended optimistically before any network activity, the streamed
//! status labels are projected into a transient watch channel, and the
//! terminal event becomes exactly one assistant message in the session that
//! was current when the exchange started.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use askdoc_core::events::{QueryResult, StreamEvent};
use askdoc_core::models::{Message, QueryMode};
use askdoc_core::{Error, Result};
use askdoc_store::SessionStore;

use crate::api::{ApiClient, QueryRequest};
use crate::event::decode_frame;
use crate::stream::{consume_stream, CancelToken, HandlerFlow, StreamOutcome};

/// Capacity of the lifecycle event feed.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle of one exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangePhase {
    #[default]
    Idle,
    /// Request issued, no response yet.
    Sending,
    /// Response body open, events flowing.
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl ExchangePhase {
    /// Whether a new exchange may start.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }
}

/// Lifecycle notifications for observers (input gating, re-render).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    Started { session_id: Uuid },
    Completed { session_id: Uuid },
    Failed { session_id: Uuid, error: String },
    Cancelled { session_id: Uuid },
}

struct ControllerState {
    phase: ExchangePhase,
    cancel: Option<CancelToken>,
    task: Option<JoinHandle<()>>,
}

/// Controller for the question/answer exchange.
pub struct QueryController {
    api: Arc<ApiClient>,
    store: Arc<SessionStore>,
    state: Mutex<ControllerState>,
    status: watch::Sender<Option<String>>,
    events: broadcast::Sender<QueryEvent>,
}

impl QueryController {
    pub fn new(api: Arc<ApiClient>, store: Arc<SessionStore>) -> Self {
        let (status, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            store,
            state: Mutex::new(ControllerState {
                phase: ExchangePhase::Idle,
                cancel: None,
                task: None,
            }),
            status,
            events,
        }
    }

    /// Current exchange phase.
    pub fn phase(&self) -> ExchangePhase {
        self.state.lock().unwrap().phase
    }

    /// Watch the transient "current step" label. `None` between exchanges
    /// and after any terminal event; never persisted.
    pub fn subscribe_status(&self) -> watch::Receiver<Option<String>> {
        self.status.subscribe()
    }

    /// Subscribe to lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.events.subscribe()
    }

    /// Start an exchange for the current session.
    ///
    /// No-op while an exchange is already in flight: the UI disables input,
    /// but the controller guards re-entrancy independently. The user message
    /// is appended before any network activity, so the question shows up
    /// even if the request never leaves the machine.
    pub fn submit(self: &Arc<Self>, question: &str, mode: QueryMode) -> Result<()> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }

        let cancel = CancelToken::new();
        {
            let mut state = self.state.lock().unwrap();
            if state.phase.is_busy() {
                debug!("submit ignored, exchange already in flight");
                return Ok(());
            }
            state.phase = ExchangePhase::Sending;
            state.cancel = Some(cancel.clone());
        }

        // Destination is pinned now; switching sessions mid-stream must not
        // redirect the answer.
        let session_id = self.store.current_id();
        if let Err(e) = self
            .store
            .append_message(session_id, Message::user(question))
        {
            let mut state = self.state.lock().unwrap();
            state.phase = ExchangePhase::Failed;
            state.cancel = None;
            return Err(e);
        }

        info!(session_id = %session_id, mode = %mode, "query submitted");
        self.emit(QueryEvent::Started { session_id });

        let controller = Arc::clone(self);
        let question = question.to_string();
        let handle = tokio::spawn(async move {
            controller
                .run_exchange(session_id, question, mode, cancel)
                .await;
        });
        self.state.lock().unwrap().task = Some(handle);
        Ok(())
    }

    /// Cancel the in-flight exchange, if any.
    ///
    /// Silent by design: an aborted exchange produces no assistant message.
    /// No-op when nothing is `Sending`/`Streaming`, including after a
    /// terminal event was already processed.
    pub fn cancel(&self) {
        let state = self.state.lock().unwrap();
        if state.phase.is_busy() {
            if let Some(cancel) = &state.cancel {
                debug!("cancelling query exchange");
                cancel.cancel();
            }
        }
    }

    /// Await the in-flight exchange task, if any. Test and shutdown hook.
    pub async fn join(&self) {
        let task = self.state.lock().unwrap().task.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn run_exchange(
        self: Arc<Self>,
        session_id: Uuid,
        question: String,
        mode: QueryMode,
        cancel: CancelToken,
    ) {
        let request = QueryRequest {
            question,
            top_k: self.api.config().top_k,
            mode,
        };

        // Racing the token here aborts the transport while the request is
        // still being sent, not just between chunks.
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                self.finish_cancelled(session_id);
                return;
            }
            response = self.api.query_stream(&request) => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                if cancel.is_cancelled() {
                    self.finish_cancelled(session_id);
                } else {
                    self.finish_failed(session_id, e);
                }
                return;
            }
        };
        self.set_phase(ExchangePhase::Streaming);

        let mut result: Option<QueryResult> = None;
        let mut server_error: Option<String> = None;
        let outcome = consume_stream(
            response.bytes_stream(),
            &cancel,
            decode_frame,
            |event| match event {
                StreamEvent::Status { text } => {
                    let _ = self.status.send(Some(text));
                    HandlerFlow::Continue
                }
                StreamEvent::Result(r) => {
                    result = Some(r);
                    HandlerFlow::Stop
                }
                StreamEvent::Error { message } => {
                    server_error = Some(message);
                    HandlerFlow::Stop
                }
                StreamEvent::Step(step) => {
                    debug!(step = %step, "ignoring pipeline step on query stream");
                    HandlerFlow::Continue
                }
            },
        )
        .await;

        let _ = self.status.send(None);

        match outcome {
            Ok(StreamOutcome::Cancelled) => self.finish_cancelled(session_id),
            Ok(_) => {
                if let Some(result) = result {
                    self.finish_completed(session_id, result, mode);
                } else if let Some(message) = server_error {
                    self.finish_failed(session_id, Error::Stream(message));
                } else {
                    // Stream closed without a terminal event; the residual
                    // (if any) was discarded by design, so this exchange
                    // produced nothing usable.
                    self.finish_failed(
                        session_id,
                        Error::Stream("stream ended without a result".to_string()),
                    );
                }
            }
            Err(e) => self.finish_failed(session_id, e),
        }
    }

    fn finish_completed(&self, session_id: Uuid, result: QueryResult, mode: QueryMode) {
        let message = Message {
            sources: if result.sources.is_empty() {
                None
            } else {
                Some(result.sources)
            },
            mode: Some(mode),
            thoughts: result.thoughts,
            latency_seconds: Some(result.processing_time),
            ..Message::assistant(result.answer)
        };
        self.deliver(session_id, message);
        self.set_phase(ExchangePhase::Completed);
        info!(session_id = %session_id, "query completed");
        self.emit(QueryEvent::Completed { session_id });
    }

    fn finish_failed(&self, session_id: Uuid, error: Error) {
        let _ = self.status.send(None);
        let text = error.to_string();
        self.deliver(session_id, Message::assistant(format!("Request failed: {}", text)));
        self.set_phase(ExchangePhase::Failed);
        error!(session_id = %session_id, error = %text, "query failed");
        self.emit(QueryEvent::Failed {
            session_id,
            error: text,
        });
    }

    fn finish_cancelled(&self, session_id: Uuid) {
        let _ = self.status.send(None);
        self.set_phase(ExchangePhase::Cancelled);
        info!(session_id = %session_id, "query cancelled");
        self.emit(QueryEvent::Cancelled { session_id });
    }

    /// Append a terminal message to the origin session. If that session was
    /// deleted mid-stream, the message is dropped silently.
    fn deliver(&self, session_id: Uuid, message: Message) {
        match self.store.append_message(session_id, message) {
            Ok(()) => {}
            Err(Error::SessionNotFound(_)) => {
                debug!(session_id = %session_id, "origin session deleted, dropping message");
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "failed to persist message");
            }
        }
    }

    fn set_phase(&self, phase: ExchangePhase) {
        let mut state = self.state.lock().unwrap();
        state.phase = phase;
        if !phase.is_busy() {
            state.cancel = None;
        }
    }

    fn emit(&self, event: QueryEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use askdoc_store::MemoryStorage;

    fn controller() -> Arc<QueryController> {
        let api = Arc::new(ApiClient::new(ClientConfig::default()).unwrap());
        let store = Arc::new(SessionStore::open(MemoryStorage::new()).unwrap());
        Arc::new(QueryController::new(api, store))
    }

    #[tokio::test]
    async fn test_initial_phase_is_idle() {
        let controller = controller();
        assert_eq!(controller.phase(), ExchangePhase::Idle);
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_a_no_op() {
        let controller = controller();
        controller.cancel();
        assert_eq!(controller.phase(), ExchangePhase::Idle);
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_before_any_append() {
        let controller = controller();
        let store = Arc::clone(&controller.store);
        assert!(controller.submit("   ", QueryMode::Fast).is_err());
        let session = store.session(store.current_id()).unwrap();
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn test_status_starts_empty() {
        let controller = controller();
        assert!(controller.subscribe_status().borrow().is_none());
    }
}
