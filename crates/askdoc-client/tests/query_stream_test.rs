//! Integration tests for the query stream controller against a mock server.
//!
//! The mock serves the real wire format: chunked bodies of
//! `data: <json>\n\n` frames, discriminated by `type`.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use askdoc_client::{ApiClient, ClientConfig, ExchangePhase, QueryController};
use askdoc_core::models::{QueryMode, Role};
use askdoc_store::{MemoryStorage, SessionStore};

fn frames(parts: &[serde_json::Value]) -> String {
    parts
        .iter()
        .map(|p| format!("data: {}\n\n", p))
        .collect::<String>()
}

async fn setup(server: &MockServer) -> (Arc<QueryController>, Arc<SessionStore>) {
    let api = Arc::new(
        ApiClient::new(
            ClientConfig::default()
                .with_base_url(server.uri())
                .with_timeout(10),
        )
        .unwrap(),
    );
    let store = Arc::new(SessionStore::open(MemoryStorage::new()).unwrap());
    (Arc::new(QueryController::new(api, store.clone())), store)
}

fn bm25_stream() -> String {
    frames(&[
        serde_json::json!({"type": "status", "content": "expanding query"}),
        serde_json::json!({"type": "status", "content": "retrieving"}),
        serde_json::json!({
            "type": "result",
            "answer": "BM25 is a ranking function...",
            "sources": ["doc1.pdf"],
            "thoughts": null,
            "metadata": {"mode": "fast"},
            "processing_time": 2.3
        }),
    ])
}

#[tokio::test]
async fn test_successful_exchange_appends_user_then_assistant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .and(body_partial_json(serde_json::json!({
            "question": "What is BM25?",
            "mode": "fast",
            "top_k": 4
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(bm25_stream(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let session_id = store.current_id();

    controller.submit("What is BM25?", QueryMode::Fast).unwrap();
    controller.join().await;

    assert_eq!(controller.phase(), ExchangePhase::Completed);
    let session = store.session(session_id).unwrap();
    assert_eq!(session.messages.len(), 2);

    let user = &session.messages[0];
    assert_eq!(user.role, Role::User);
    assert_eq!(user.content, "What is BM25?");

    let assistant = &session.messages[1];
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.content, "BM25 is a ranking function...");
    assert_eq!(assistant.mode, Some(QueryMode::Fast));
    assert_eq!(assistant.latency_seconds, Some(2.3));
    assert_eq!(assistant.sources.as_deref(), Some(&["doc1.pdf".to_string()][..]));
}

#[tokio::test]
async fn test_double_submit_sends_one_request_and_one_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(bm25_stream(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let session_id = store.current_id();

    controller.submit("What is BM25?", QueryMode::Fast).unwrap();
    // Second submit while Sending: ignored entirely
    controller.submit("What is BM25?", QueryMode::Fast).unwrap();
    controller.join().await;

    let session = store.session(session_id).unwrap();
    let user_messages = session
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .count();
    assert_eq!(user_messages, 1);
    // The mock's expect(1) verifies exactly one request went out
}

#[tokio::test]
async fn test_server_error_event_yields_single_failure_message() {
    let server = MockServer::start().await;
    let body = frames(&[
        serde_json::json!({"type": "status", "content": "Generating Answer..."}),
        serde_json::json!({"type": "error", "answer": "System Error", "thoughts": "index unavailable"}),
    ]);
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let session_id = store.current_id();

    controller.submit("anything", QueryMode::Deep).unwrap();
    controller.join().await;

    assert_eq!(controller.phase(), ExchangePhase::Failed);
    let session = store.session(session_id).unwrap();
    assert_eq!(session.messages.len(), 2);
    let assistant = &session.messages[1];
    assert_eq!(assistant.role, Role::Assistant);
    // Failure notice, never partial status content
    assert!(assistant.content.contains("index unavailable"));
    assert!(assistant.latency_seconds.is_none());
}

#[tokio::test]
async fn test_non_2xx_response_fails_but_keeps_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_string("System not ready"))
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let session_id = store.current_id();

    controller.submit("hello?", QueryMode::Deep).unwrap();
    controller.join().await;

    assert_eq!(controller.phase(), ExchangePhase::Failed);
    let session = store.session(session_id).unwrap();
    // Optimistic user message survives the failure
    assert_eq!(session.messages[0].content, "hello?");
    assert_eq!(session.messages.len(), 2);
    assert!(session.messages[1].content.contains("503"));
}

#[tokio::test]
async fn test_stream_ending_without_result_is_a_failure() {
    let server = MockServer::start().await;
    let body = frames(&[serde_json::json!({"type": "status", "content": "retrieving"})]);
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    controller.submit("q", QueryMode::Fast).unwrap();
    controller.join().await;

    assert_eq!(controller.phase(), ExchangePhase::Failed);
    let session = store.session(store.current_id()).unwrap();
    assert_eq!(session.messages.len(), 2);
}

#[tokio::test]
async fn test_cancel_mid_flight_appends_no_assistant_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_raw(bm25_stream(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let session_id = store.current_id();

    controller.submit("slow question", QueryMode::Deep).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.cancel();
    controller.join().await;

    assert_eq!(controller.phase(), ExchangePhase::Cancelled);
    let session = store.session(session_id).unwrap();
    // Silent stop: the question stays, nothing else appears
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].role, Role::User);
}

#[tokio::test]
async fn test_cancel_after_completion_is_a_no_op() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(bm25_stream(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let session_id = store.current_id();

    controller.submit("What is BM25?", QueryMode::Fast).unwrap();
    controller.join().await;
    assert_eq!(controller.phase(), ExchangePhase::Completed);

    controller.cancel();

    assert_eq!(controller.phase(), ExchangePhase::Completed);
    // The already-appended assistant message is not retracted
    assert_eq!(store.session(session_id).unwrap().messages.len(), 2);
}

#[tokio::test]
async fn test_result_lands_in_origin_session_after_switch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_raw(bm25_stream(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let origin = store.current_id();

    controller.submit("What is BM25?", QueryMode::Fast).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    // User switches to a new chat while the answer is still streaming
    let other = store.create_session().unwrap();
    controller.join().await;

    let origin_session = store.session(origin).unwrap();
    assert_eq!(origin_session.messages.len(), 2);
    assert!(store.session(other).unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_origin_session_deleted_mid_flight_drops_result_silently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_raw(bm25_stream(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let origin = store.current_id();

    controller.submit("What is BM25?", QueryMode::Fast).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.create_session().unwrap();
    store.delete_session(origin).unwrap();
    controller.join().await;

    // Exchange still completes; the message just has nowhere to go
    assert_eq!(controller.phase(), ExchangePhase::Completed);
    for session in store.sessions() {
        assert!(session.messages.is_empty());
    }
}

#[tokio::test]
async fn test_status_labels_are_transient_and_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(bm25_stream(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (controller, store) = setup(&server).await;
    let status_rx = controller.subscribe_status();

    controller.submit("What is BM25?", QueryMode::Fast).unwrap();
    controller.join().await;

    // Cleared on the terminal event, and never persisted anywhere
    assert!(status_rx.borrow().is_none());
    let session = store.session(store.current_id()).unwrap();
    for message in &session.messages {
        assert!(!message.content.contains("expanding query"));
    }
}

#[tokio::test]
async fn test_query_once_returns_final_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "answer": "42",
            "sources": ["deep_thought.pdf"],
            "metadata": {"mode": "deep"},
            "processing_time": 7.5,
            "thoughts": "multiplied"
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(ClientConfig::default().with_base_url(server.uri())).unwrap();
    let result = api
        .query_once(&askdoc_client::QueryRequest {
            question: "ultimate?".to_string(),
            top_k: 4,
            mode: QueryMode::Deep,
        })
        .await
        .unwrap();

    assert_eq!(result.answer, "42");
    assert_eq!(result.sources, vec!["deep_thought.pdf"]);
    assert_eq!(result.thoughts.as_deref(), Some("multiplied"));
    assert_eq!(result.processing_time, 7.5);
}
