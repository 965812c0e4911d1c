//! Frame payload decoding.
//!
//! One complete frame in, at most one [`StreamEvent`] out. Frames without the
//! `data: ` marker (comments, keep-alives) are not events. A marked frame
//! whose payload cannot be decoded is dropped with a local diagnostic; a
//! single malformed frame must never terminate the exchange, and no decode
//! failure is ever surfaced to the user.

use serde_json::Value;
use tracing::{debug, warn};

use askdoc_core::events::{QueryResult, StreamEvent};
use askdoc_core::pipeline::PipelineStep;

/// Marker prefixing every event-bearing line.
const DATA_PREFIX: &str = "data: ";

/// Decode one complete frame into an event, or `None` for non-events.
pub fn decode_frame(frame: &str) -> Option<StreamEvent> {
    let data = frame.lines().find_map(|line| line.strip_prefix(DATA_PREFIX))?;

    let payload: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "dropping malformed frame payload");
            return None;
        }
    };

    decode_payload(payload)
}

fn decode_payload(payload: Value) -> Option<StreamEvent> {
    // Query streams discriminate on "type"
    if let Some(kind) = payload.get("type").and_then(Value::as_str) {
        return match kind {
            "status" => {
                let text = payload.get("content").and_then(Value::as_str)?.to_string();
                Some(StreamEvent::Status { text })
            }
            "result" => match serde_json::from_value::<QueryResult>(payload.clone()) {
                Ok(result) => Some(StreamEvent::Result(result)),
                Err(e) => {
                    warn!(error = %e, "dropping result frame with unusable payload");
                    None
                }
            },
            "error" => Some(StreamEvent::Error {
                message: error_message(&payload),
            }),
            other => {
                debug!(kind = other, "ignoring frame with unrecognized type");
                None
            }
        };
    }

    // Ingestion streams carry bare "step"/"error" objects
    if let Some(message) = payload.get("error").and_then(Value::as_str) {
        return Some(StreamEvent::Error {
            message: message.to_string(),
        });
    }
    if let Some(name) = payload.get("step").and_then(Value::as_str) {
        return match PipelineStep::parse(name) {
            Some(step) => Some(StreamEvent::Step(step)),
            None => {
                debug!(step = name, "ignoring unknown pipeline step");
                None
            }
        };
    }

    debug!("ignoring frame without a recognized discriminant");
    None
}

/// The server reports query-stream errors with the detail in `thoughts` and
/// a generic `answer`; later revisions use `message`. Prefer the most
/// specific field present.
fn error_message(payload: &Value) -> String {
    for field in ["message", "thoughts", "answer"] {
        if let Some(text) = payload.get(field).and_then(Value::as_str) {
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    "unknown server error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_status() {
        let event = decode_frame(r#"data: {"type":"status","content":"Retrieving..."}"#);
        assert_eq!(
            event,
            Some(StreamEvent::Status {
                text: "Retrieving...".to_string()
            })
        );
    }

    #[test]
    fn test_decode_result() {
        let frame = r#"data: {"type":"result","answer":"BM25 is a ranking function","sources":["doc1.pdf"],"thoughts":null,"processing_time":2.3}"#;
        match decode_frame(frame) {
            Some(StreamEvent::Result(result)) => {
                assert_eq!(result.answer, "BM25 is a ranking function");
                assert_eq!(result.sources, vec!["doc1.pdf"]);
                assert!(result.thoughts.is_none());
                assert_eq!(result.processing_time, 2.3);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_decode_result_with_metadata_extras() {
        // The server also sends a metadata object; unknown fields are ignored
        let frame = r#"data: {"type":"result","answer":"x","sources":[],"metadata":{"mode":"fast"},"processing_time":0.5}"#;
        assert!(matches!(
            decode_frame(frame),
            Some(StreamEvent::Result(_))
        ));
    }

    #[test]
    fn test_decode_query_error_prefers_thoughts_over_answer() {
        let frame = r#"data: {"type":"error","answer":"System Error","thoughts":"index unavailable"}"#;
        assert_eq!(
            decode_frame(frame),
            Some(StreamEvent::Error {
                message: "index unavailable".to_string()
            })
        );
    }

    #[test]
    fn test_decode_query_error_without_detail() {
        let frame = r#"data: {"type":"error"}"#;
        assert_eq!(
            decode_frame(frame),
            Some(StreamEvent::Error {
                message: "unknown server error".to_string()
            })
        );
    }

    #[test]
    fn test_decode_step() {
        let event = decode_frame(r#"data: {"step":"clean"}"#);
        assert_eq!(event, Some(StreamEvent::Step(PipelineStep::Clean)));
    }

    #[test]
    fn test_decode_ingest_error() {
        let event = decode_frame(r#"data: {"error":"File too large: 99 bytes"}"#);
        assert_eq!(
            event,
            Some(StreamEvent::Error {
                message: "File too large: 99 bytes".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_step_name_is_not_an_event() {
        assert_eq!(decode_frame(r#"data: {"step":"transmogrify"}"#), None);
    }

    #[test]
    fn test_unknown_type_is_not_an_event() {
        assert_eq!(decode_frame(r#"data: {"type":"heartbeat"}"#), None);
    }

    #[test]
    fn test_frame_without_marker_is_not_an_event() {
        assert_eq!(decode_frame(": keep-alive"), None);
        assert_eq!(decode_frame(""), None);
        assert_eq!(decode_frame("event: ping"), None);
    }

    #[test]
    fn test_malformed_json_is_dropped_not_raised() {
        assert_eq!(decode_frame("data: {not json"), None);
    }

    #[test]
    fn test_payload_without_discriminant_is_not_an_event() {
        assert_eq!(decode_frame(r#"data: {"content":"orphan"}"#), None);
        assert_eq!(decode_frame(r#"data: 42"#), None);
    }

    #[test]
    fn test_marker_requires_exact_prefix() {
        assert_eq!(decode_frame(r#"data:{"type":"status","content":"x"}"#), None);
    }

    #[test]
    fn test_multi_line_frame_finds_data_line() {
        let frame = "event: message\ndata: {\"step\":\"embed\"}";
        assert_eq!(
            decode_frame(frame),
            Some(StreamEvent::Step(PipelineStep::Embed))
        );
    }
}
