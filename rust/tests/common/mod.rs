#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use taskmcp::tool_api::{ToolClient, ToolClientBuilder};
use tokio::sync::Mutex;

pub const TOKEN: &str = "test-token";

#[derive(Clone, Default)]
pub struct MockState {
    pub calls: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub body: Value,
}

impl MockState {
    /// Records the request and returns its 1-indexed attempt number.
    pub async fn record(&self, headers: &HeaderMap, body: Value) -> usize {
        let header_value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().await.push(RecordedRequest {
            authorization: header_value(header::AUTHORIZATION),
            accept: header_value(header::ACCEPT),
            body,
        });
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .await
            .last()
            .cloned()
            .expect("at least one recorded request")
    }
}

pub async fn spawn_mock_server(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock app");
    });

    (base_url, task)
}

pub fn client_builder(base_url: &str) -> ToolClientBuilder {
    ToolClientBuilder::new(base_url, TOKEN)
        .timeout(Duration::from_secs(5))
        .retry_delay(Duration::from_millis(20))
}

pub fn client(base_url: &str) -> ToolClient {
    client_builder(base_url).build().expect("build tool client")
}

/// Renders `(event, data)` pairs as a complete `text/event-stream` body.
pub fn sse_response(frames: &[(&str, Value)]) -> Response {
    let mut body = String::new();
    for (event, data) in frames {
        body.push_str(&format!("event: {event}\ndata: {data}\n\n"));
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
        .into_response()
}

pub fn ndjson_response(lines: &[Value]) -> Response {
    let body = lines
        .iter()
        .map(|line| format!("{line}\n"))
        .collect::<String>();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response()
}

pub fn json_error_response(status: StatusCode, error: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "error": error }).to_string(),
    )
        .into_response()
}
