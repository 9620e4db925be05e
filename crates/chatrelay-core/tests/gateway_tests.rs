//! OpenAI-compatible gateway against a local fake upstream.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chatrelay_core::config::LlmSettings;
use chatrelay_core::llm::sse::decode_body;
use chatrelay_core::{ModelGateway, OpenAiGateway, RelayError, Turn};
use futures::StreamExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Captured {
    auth: Arc<Mutex<Option<String>>>,
    body: Arc<Mutex<Option<Value>>>,
}

#[derive(Clone)]
struct Upstream {
    captured: Captured,
    status: StatusCode,
    body: &'static str,
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    *upstream.captured.auth.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *upstream.captured.body.lock().unwrap() = Some(body);

    (
        upstream.status,
        [(header::CONTENT_TYPE, "text/event-stream")],
        upstream.body,
    )
}

/// Start a fake provider and return its base URL.
async fn spawn_upstream(status: StatusCode, body: &'static str) -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(Upstream {
            captured: captured.clone(),
            status,
            body,
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), captured)
}

async fn drain(gateway: &OpenAiGateway, context: &[Turn]) -> Vec<String> {
    let mut stream = gateway.stream(context).await.unwrap();
    let mut fragments = Vec::new();
    while let Some(item) = stream.next().await {
        fragments.push(item.unwrap());
    }
    fragments
}

const HAPPY_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n",
    "data: [DONE]\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"after done\"}}]}\n\n",
);

// ========================================================================
// Happy path
// ========================================================================

#[tokio::test]
async fn test_gateway_streams_fragments_in_order() {
    let (base_url, _captured) = spawn_upstream(StatusCode::OK, HAPPY_BODY).await;
    let gateway = OpenAiGateway::new(Some("sk-test".into())).with_base_url(base_url);

    let fragments = drain(&gateway, &[Turn::user("Hi")]).await;

    assert_eq!(fragments, vec!["He", "llo"]);
}

#[tokio::test]
async fn test_gateway_sends_model_messages_and_bearer_key() {
    let (base_url, captured) = spawn_upstream(StatusCode::OK, HAPPY_BODY).await;
    let gateway = OpenAiGateway::new(Some("sk-test".into()))
        .with_base_url(format!("{}/", base_url))
        .with_model("test-model")
        .with_max_tokens(50);

    let context = vec![Turn::user("Hi"), Turn::assistant("Hello"), Turn::user("Again")];
    drain(&gateway, &context).await;

    assert_eq!(
        captured.auth.lock().unwrap().as_deref(),
        Some("Bearer sk-test")
    );
    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["max_tokens"], 50);
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][1]["role"], "assistant");
    assert_eq!(body["messages"][2]["content"], "Again");
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_gateway_skips_malformed_chunks() {
    const BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
        "data: {broken\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
    );
    let (base_url, _captured) = spawn_upstream(StatusCode::OK, BODY).await;
    let gateway = OpenAiGateway::new(None).with_base_url(base_url);

    assert_eq!(drain(&gateway, &[Turn::user("x")]).await, vec!["a", "b"]);
}

#[test]
fn test_gateway_from_settings_uses_configured_endpoint() {
    let settings = LlmSettings {
        base_url: "http://localhost:9999/".into(),
        model: "m".into(),
        ..LlmSettings::default()
    };
    let gateway = OpenAiGateway::from_settings(&settings);

    assert_eq!(gateway.endpoint(), "http://localhost:9999/v1/chat/completions");
    assert_eq!(gateway.model(), "m");
}

#[test]
fn test_gateway_defaults_to_groq() {
    let gateway = OpenAiGateway::new(None);

    assert_eq!(
        gateway.endpoint(),
        "https://api.groq.com/openai/v1/chat/completions"
    );
    assert_eq!(gateway.model(), "llama-3.3-70b-versatile");
}

// ========================================================================
// Failures
// ========================================================================

#[tokio::test]
async fn test_gateway_non_success_status_is_rejected() {
    let (base_url, _captured) =
        spawn_upstream(StatusCode::UNAUTHORIZED, "{\"error\":\"invalid api key\"}").await;
    let gateway = OpenAiGateway::new(Some("bad".into())).with_base_url(base_url);

    let err = gateway.stream(&[Turn::user("Hi")]).await.err().unwrap();

    match err {
        RelayError::GatewayRejected { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid api key"));
        }
        other => panic!("expected GatewayRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gateway_unreachable_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = OpenAiGateway::new(None).with_base_url(format!("http://{}", addr));
    let err = gateway.stream(&[Turn::user("Hi")]).await.err().unwrap();

    assert!(matches!(err, RelayError::GatewayUnavailable(_)));
    assert!(err.is_gateway_failure());
}

#[tokio::test]
async fn test_body_error_ends_stream_with_interruption() {
    let chunks: Vec<Result<&'static [u8], std::io::Error>> = vec![
        Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n"[..]),
        Err(std::io::Error::other("connection reset")),
        Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n"[..]),
    ];
    let mut stream = decode_body(futures::stream::iter(chunks));

    assert_eq!(stream.next().await.unwrap().unwrap(), "par");
    assert!(matches!(
        stream.next().await,
        Some(Err(RelayError::UpstreamInterrupted(_)))
    ));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_body_without_done_marker_ends_at_eof() {
    let chunks: Vec<Result<&'static [u8], std::io::Error>> = vec![
        Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n"[..]),
        Ok(&b"data: {\"choices\":[{\"delta\":{\"content\":\"two\"}}]}"[..]),
    ];
    let fragments: Vec<String> = decode_body(futures::stream::iter(chunks))
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["one", "two"]);
}
