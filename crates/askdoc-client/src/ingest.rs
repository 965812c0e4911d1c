//! Ingestion stream controller.
//!
//! Same shape as the query controller, specialized for document upload: the
//! streamed step events drive the pipeline state machine, and a completed
//! ingestion triggers a read-through refresh of the document list. A failed
//! task stays visible for the user to retry or discard.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use askdoc_core::events::StreamEvent;
use askdoc_core::models::{UploadState, UploadTask};
use askdoc_core::pipeline::{advance, PipelineStep};
use askdoc_core::{Error, Result};

use crate::api::ApiClient;
use crate::documents::DocumentIndex;
use crate::event::decode_frame;
use crate::query::ExchangePhase;
use crate::stream::{consume_stream, CancelToken, HandlerFlow, StreamOutcome};

/// Capacity of the lifecycle event feed.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle notifications for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Started { file_name: String },
    StepReached { file_name: String, step: PipelineStep },
    Completed { file_name: String },
    Failed { file_name: String, error: String },
    Cancelled { file_name: String },
}

struct ControllerState {
    phase: ExchangePhase,
    cancel: Option<CancelToken>,
    task: Option<JoinHandle<()>>,
}

/// Controller for the document upload exchange.
pub struct IngestController {
    api: Arc<ApiClient>,
    documents: Arc<DocumentIndex>,
    state: Mutex<ControllerState>,
    /// Snapshot of the in-flight (or last terminal) upload task.
    task_view: watch::Sender<Option<UploadTask>>,
    events: broadcast::Sender<IngestEvent>,
}

impl IngestController {
    pub fn new(api: Arc<ApiClient>, documents: Arc<DocumentIndex>) -> Self {
        let (task_view, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            documents,
            state: Mutex::new(ControllerState {
                phase: ExchangePhase::Idle,
                cancel: None,
                task: None,
            }),
            task_view,
            events,
        }
    }

    /// Current exchange phase.
    pub fn phase(&self) -> ExchangePhase {
        self.state.lock().unwrap().phase
    }

    /// Watch the upload task snapshot.
    pub fn subscribe_task(&self) -> watch::Receiver<Option<UploadTask>> {
        self.task_view.subscribe()
    }

    /// Subscribe to lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.events.subscribe()
    }

    /// Start uploading one file.
    ///
    /// No-op while an upload is already in flight (one upload slot from this
    /// client's perspective).
    pub fn submit(self: &Arc<Self>, file_name: &str, content: Vec<u8>) -> Result<()> {
        if file_name.trim().is_empty() {
            return Err(Error::InvalidInput("file name is empty".to_string()));
        }

        let cancel = CancelToken::new();
        {
            let mut state = self.state.lock().unwrap();
            if state.phase.is_busy() {
                debug!("upload ignored, ingestion already in flight");
                return Ok(());
            }
            state.phase = ExchangePhase::Sending;
            state.cancel = Some(cancel.clone());
        }

        let mut task = UploadTask::new(file_name);
        task.state = UploadState::Uploading;
        let _ = self.task_view.send(Some(task));

        info!(file_name, size = content.len(), "upload submitted");
        self.emit(IngestEvent::Started {
            file_name: file_name.to_string(),
        });

        let controller = Arc::clone(self);
        let file_name = file_name.to_string();
        let handle = tokio::spawn(async move {
            controller.run_exchange(file_name, content, cancel).await;
        });
        self.state.lock().unwrap().task = Some(handle);
        Ok(())
    }

    /// Cancel the in-flight upload, if any. Silent by design.
    pub fn cancel(&self) {
        let state = self.state.lock().unwrap();
        if state.phase.is_busy() {
            if let Some(cancel) = &state.cancel {
                debug!("cancelling upload exchange");
                cancel.cancel();
            }
        }
    }

    /// Drop a terminal task from view (the user dismissed a failed or
    /// finished upload). No-op while an upload is in flight.
    pub fn discard(&self) {
        if !self.phase().is_busy() {
            let _ = self.task_view.send(None);
        }
    }

    /// Await the in-flight exchange task, if any. Test and shutdown hook.
    pub async fn join(&self) {
        let task = self.state.lock().unwrap().task.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn run_exchange(self: Arc<Self>, file_name: String, content: Vec<u8>, cancel: CancelToken) {
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                self.finish_cancelled(&file_name);
                return;
            }
            response = self.api.upload(&file_name, content) => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                if cancel.is_cancelled() {
                    self.finish_cancelled(&file_name);
                } else {
                    self.finish_failed(&file_name, e);
                }
                return;
            }
        };
        self.set_phase(ExchangePhase::Streaming);

        let mut machine = PipelineStep::Idle;
        let mut server_error: Option<String> = None;
        let outcome = consume_stream(
            response.bytes_stream(),
            &cancel,
            decode_frame,
            |event| match event {
                StreamEvent::Step(observed) => {
                    let next = advance(machine, observed);
                    if next != machine {
                        machine = next;
                        self.project_step(&file_name, machine);
                    } else {
                        debug!(step = %observed, current = %machine, "ignoring stale step");
                    }
                    if machine.is_terminal() {
                        HandlerFlow::Stop
                    } else {
                        HandlerFlow::Continue
                    }
                }
                StreamEvent::Error { message } => {
                    server_error = Some(message);
                    HandlerFlow::Stop
                }
                other => {
                    debug!(event = ?other, "ignoring non-ingestion event on upload stream");
                    HandlerFlow::Continue
                }
            },
        )
        .await;

        match outcome {
            Ok(StreamOutcome::Cancelled) => self.finish_cancelled(&file_name),
            Ok(_) => {
                if let Some(message) = server_error {
                    self.finish_failed(&file_name, Error::Stream(message));
                } else if machine == PipelineStep::Complete {
                    self.finish_completed(&file_name).await;
                } else if machine == PipelineStep::Error {
                    self.finish_failed(
                        &file_name,
                        Error::Stream("ingestion pipeline reported an error".to_string()),
                    );
                } else {
                    self.finish_failed(
                        &file_name,
                        Error::Stream("stream ended before ingestion completed".to_string()),
                    );
                }
            }
            Err(e) => self.finish_failed(&file_name, e),
        }
    }

    fn project_step(&self, file_name: &str, step: PipelineStep) {
        self.task_view.send_modify(|task| {
            if let Some(task) = task {
                task.current_step = step;
            }
        });
        self.emit(IngestEvent::StepReached {
            file_name: file_name.to_string(),
            step,
        });
    }

    async fn finish_completed(&self, file_name: &str) {
        self.task_view.send_modify(|task| {
            if let Some(task) = task {
                task.state = UploadState::Success;
                task.current_step = PipelineStep::Complete;
            }
        });
        self.set_phase(ExchangePhase::Completed);
        info!(file_name, "ingestion complete");
        self.emit(IngestEvent::Completed {
            file_name: file_name.to_string(),
        });

        // Read-through: the server owns document metadata, so re-list
        // instead of synthesizing the new entry locally.
        if let Err(e) = self.documents.refresh().await {
            warn!(error = %e, "document list refresh after ingestion failed");
        }
    }

    fn finish_failed(&self, file_name: &str, error: Error) {
        // Task stays visible in the error state for retry or discard
        self.task_view.send_modify(|task| {
            if let Some(task) = task {
                task.state = UploadState::Error;
                task.current_step = PipelineStep::Error;
            }
        });
        self.set_phase(ExchangePhase::Failed);
        let text = error.to_string();
        error!(file_name, error = %text, "ingestion failed");
        self.emit(IngestEvent::Failed {
            file_name: file_name.to_string(),
            error: text,
        });
    }

    fn finish_cancelled(&self, file_name: &str) {
        let _ = self.task_view.send(None);
        self.set_phase(ExchangePhase::Cancelled);
        info!(file_name, "upload cancelled");
        self.emit(IngestEvent::Cancelled {
            file_name: file_name.to_string(),
        });
    }

    fn set_phase(&self, phase: ExchangePhase) {
        let mut state = self.state.lock().unwrap();
        state.phase = phase;
        if !phase.is_busy() {
            state.cancel = None;
        }
    }

    fn emit(&self, event: IngestEvent) {
        let _ = self.events.send(event);
    }
}
