//! Generic cancellable stream-consumption engine.
//!
//! Both controllers (query and ingestion) consume the same kind of chunked
//! response body: bytes in, frames out, events dispatched to a handler. The
//! engine factors that loop out once, parameterized by the decoded event type
//! and the per-event handler. Cancellation is cooperative and checked after
//! every suspension point; a cancelled exchange is an outcome, not an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::Notify;
use tracing::debug;

use askdoc_core::{Error, Result};

use crate::frame::FrameReassembler;

/// Cooperative cancellation signal shared between a controller and its
/// in-flight exchange task.
///
/// Cloning is cheap; all clones observe the same signal. Cancellation is
/// one-way and sticky.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is signaled.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check between registering and awaiting: a cancel in that
            // window would otherwise be missed (notify_waiters stores no
            // permit).
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Handler verdict after each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFlow {
    /// Keep consuming.
    Continue,
    /// Terminal event processed; stop reading the stream.
    Stop,
}

/// How a consumption loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Producer exhausted without the handler stopping.
    Exhausted,
    /// Handler reported a terminal event.
    Stopped,
    /// Cancellation was observed; no further frames were processed.
    Cancelled,
}

/// Consume a chunked response body: reassemble frames, decode events, and
/// feed them to `on_event` until the stream ends, the handler stops, or the
/// token is cancelled.
///
/// Transport errors surface as `Err`; cancellation does not. A residual
/// unterminated frame at end of stream is discarded (a frame that never got
/// its delimiter was never sent).
pub async fn consume_stream<S, E, Ev, D, F>(
    body: S,
    cancel: &CancelToken,
    decode: D,
    mut on_event: F,
) -> Result<StreamOutcome>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
    D: Fn(&str) -> Option<Ev>,
    F: FnMut(Ev) -> HandlerFlow,
{
    futures::pin_mut!(body);
    let mut reassembler = FrameReassembler::new();

    loop {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }

        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            chunk = body.next() => chunk,
        };

        let bytes = match chunk {
            None => break,
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(bytes)) => bytes,
        };

        for frame in reassembler.push(&bytes) {
            if cancel.is_cancelled() {
                return Ok(StreamOutcome::Cancelled);
            }
            if let Some(event) = decode(&frame) {
                if on_event(event) == HandlerFlow::Stop {
                    return Ok(StreamOutcome::Stopped);
                }
            }
        }
    }

    if reassembler.residual_len() > 0 {
        debug!(
            residual = reassembler.residual_len(),
            "stream ended mid-frame, discarding residual bytes"
        );
    }
    Ok(StreamOutcome::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::decode_frame;
    use askdoc_core::StreamEvent;

    fn chunks(parts: &[&str]) -> Vec<std::result::Result<Bytes, Error>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    #[tokio::test]
    async fn test_consume_collects_events_in_order() {
        let body = futures::stream::iter(chunks(&[
            "data: {\"type\":\"status\",\"content\":\"a\"}\n\ndata: {\"type\":",
            "\"status\",\"content\":\"b\"}\n\n",
        ]));
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        let outcome = consume_stream(body, &cancel, decode_frame, |event| {
            if let StreamEvent::Status { text } = event {
                seen.push(text);
            }
            HandlerFlow::Continue
        })
        .await
        .unwrap();

        assert_eq!(outcome, StreamOutcome::Exhausted);
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_handler_stop_ends_consumption() {
        let body = futures::stream::iter(chunks(&[
            "data: {\"step\":\"complete\"}\n\ndata: {\"step\":\"extract\"}\n\n",
        ]));
        let cancel = CancelToken::new();
        let mut count = 0;

        let outcome = consume_stream(body, &cancel, decode_frame, |_| {
            count += 1;
            HandlerFlow::Stop
        })
        .await
        .unwrap();

        assert_eq!(outcome, StreamOutcome::Stopped);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_processes_nothing() {
        let body = futures::stream::iter(chunks(&["data: {\"step\":\"extract\"}\n\n"]));
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut count = 0;

        let outcome = consume_stream(body, &cancel, decode_frame, |_| {
            count += 1;
            HandlerFlow::Continue
        })
        .await
        .unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_stops_between_frames() {
        let cancel = CancelToken::new();
        let cancel_inside = cancel.clone();
        let body = futures::stream::iter(chunks(&[
            "data: {\"step\":\"extract\"}\n\ndata: {\"step\":\"clean\"}\n\n",
        ]));
        let mut seen = 0;

        let outcome = consume_stream(body, &cancel, decode_frame, move |_| {
            seen += 1;
            // Cancel from the handler: the next frame must not be processed
            cancel_inside.cancel();
            HandlerFlow::Continue
        })
        .await
        .unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"step\":\"extract\"}\n\n")),
            Err(Error::Request("connection reset".to_string())),
        ]);
        let cancel = CancelToken::new();

        let err = consume_stream(body, &cancel, decode_frame, |_| HandlerFlow::Continue)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }

    #[tokio::test]
    async fn test_residual_is_discarded_silently() {
        let body = futures::stream::iter(chunks(&[
            "data: {\"step\":\"extract\"}\n\ndata: {\"step\":\"cle",
        ]));
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        let outcome = consume_stream(body, &cancel, decode_frame, |event| {
            seen.push(event);
            HandlerFlow::Continue
        })
        .await
        .unwrap();

        assert_eq!(outcome, StreamOutcome::Exhausted);
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_frames_do_not_end_the_stream() {
        let body = futures::stream::iter(chunks(&[
            "data: {broken\n\ndata: {\"step\":\"embed\"}\n\n",
        ]));
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        consume_stream(body, &cancel, decode_frame, |event| {
            seen.push(event);
            HandlerFlow::Continue
        })
        .await
        .unwrap();

        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiter() {
        let cancel = CancelToken::new();
        let waiter = cancel.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        cancel.cancel();
        handle.await.unwrap();
        assert!(cancel.is_cancelled());
    }
}
