//! Decoding of tool-execution response bodies.
//!
//! Both transports produce the same [`StreamEvent`] sequence; the only
//! difference is framing. [`collect_result`] folds either sequence into the
//! final `result` payload.

use std::io;

use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::io::StreamReader;

use crate::tool_api::error::ToolError;
use crate::tool_api::protocol::{ErrorPayload, StreamEvent};

pub type ByteStream = BoxStream<'static, Result<Bytes, ToolError>>;
pub type EventStream = BoxStream<'static, Result<StreamEvent, ToolError>>;

/// A response framing the client knows how to request and decode.
pub trait StreamFormat: Send + Sync {
    /// Request path relative to the base address.
    fn path(&self) -> &'static str;

    /// Value of the `Accept` header selecting this framing.
    fn accept(&self) -> &'static str;

    /// Lazily decodes `body` into events. Frames that cannot be decoded are skipped.
    fn events(&self, body: ByteStream) -> EventStream;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SseFormat;

/// Longest NDJSON line buffered before the stream is abandoned.
pub const DEFAULT_MAX_NDJSON_LINE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct NdjsonFormat {
    max_line_length: usize,
}

impl NdjsonFormat {
    pub const fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_NDJSON_LINE)
    }

    pub const fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }
}

impl Default for NdjsonFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFormat for SseFormat {
    fn path(&self) -> &'static str {
        "/sse"
    }

    fn accept(&self) -> &'static str {
        "text/event-stream"
    }

    fn events(&self, body: ByteStream) -> EventStream {
        body.eventsource()
            .filter_map(|item| async move {
                match item {
                    Ok(event) => decode_sse_event(&event.event, &event.data).map(Ok),
                    Err(EventStreamError::Transport(err)) => Some(Err(err)),
                    Err(err) => Some(Err(ToolError::protocol(format!(
                        "Malformed SSE stream: {err}"
                    )))),
                }
            })
            .boxed()
    }
}

impl StreamFormat for NdjsonFormat {
    fn path(&self) -> &'static str {
        "/mcp"
    }

    fn accept(&self) -> &'static str {
        "application/x-ndjson"
    }

    fn events(&self, body: ByteStream) -> EventStream {
        let reader = StreamReader::new(body.map(|chunk| chunk.map_err(io::Error::other)));
        let codec = AnyDelimiterCodec::new_with_max_length(
            b"\n".to_vec(),
            Vec::new(),
            self.max_line_length,
        );
        let max_line_length = self.max_line_length;
        FramedRead::new(reader, codec)
            .filter_map(move |line| async move {
                match line {
                    Ok(line) => decode_ndjson_line(&line).map(Ok),
                    Err(err) => Some(Err(framing_error(err, max_line_length))),
                }
            })
            .boxed()
    }
}

fn decode_sse_event(name: &str, data: &str) -> Option<StreamEvent> {
    match name {
        "heartbeat" => Some(StreamEvent::Heartbeat),
        "result" | "error" => {
            let payload = match serde_json::from_str::<Value>(data) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!("Failed to parse SSE data for '{name}' event: {err}");
                    return None;
                }
            };
            if name == "error" {
                return Some(StreamEvent::Error(ErrorPayload::from_envelope(&payload)));
            }
            result_event(payload, "SSE result event")
        }
        other => {
            tracing::debug!("Ignoring SSE event '{other}'");
            None
        }
    }
}

fn decode_ndjson_line(line: &[u8]) -> Option<StreamEvent> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let payload = match serde_json::from_slice::<Value>(line) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(
                "Failed to parse NDJSON line: {} ({err})",
                String::from_utf8_lossy(line)
            );
            return None;
        }
    };

    match payload.get("type").and_then(Value::as_str) {
        Some("start") => Some(StreamEvent::Start),
        Some("heartbeat") => Some(StreamEvent::Heartbeat),
        Some("end") => Some(StreamEvent::End),
        Some("error") => Some(StreamEvent::Error(ErrorPayload::from_envelope(&payload))),
        Some("result") => result_event(payload, "NDJSON result line"),
        other => {
            tracing::debug!("Ignoring NDJSON line with type {other:?}");
            None
        }
    }
}

/// A missing or `null` `result` member counts as no result.
fn result_event(mut payload: Value, source: &str) -> Option<StreamEvent> {
    match payload.get_mut("result").map(Value::take) {
        Some(Value::Null) | None => {
            tracing::warn!("{source} carried no 'result' value, skipping");
            None
        }
        Some(result) => Some(StreamEvent::Result(result)),
    }
}

fn framing_error(err: AnyDelimiterCodecError, max_line_length: usize) -> ToolError {
    match err {
        AnyDelimiterCodecError::Io(err) => match err.into_inner() {
            Some(inner) => match inner.downcast::<ToolError>() {
                Ok(tool_err) => *tool_err,
                Err(other) => ToolError::transport(other.to_string()),
            },
            None => ToolError::transport("NDJSON stream read failed"),
        },
        AnyDelimiterCodecError::MaxChunkLengthExceeded => ToolError::protocol(format!(
            "NDJSON line exceeded {max_line_length} bytes"
        )),
    }
}

/// Drains events until a terminal signal and returns the last `result` seen.
///
/// An `error` event returns immediately without reading the rest of the stream.
pub async fn collect_result(mut events: EventStream) -> Result<Value, ToolError> {
    let mut result = None;

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::Result(value) => result = Some(value),
            StreamEvent::Error(payload) => return Err(payload.into_error()),
            StreamEvent::End => break,
            StreamEvent::Start | StreamEvent::Heartbeat => continue,
        }
    }

    result.ok_or_else(ToolError::no_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_api::error::{ErrorCode, ErrorKind};
    use futures::stream;
    use serde_json::json;

    fn body(chunks: &[&'static str]) -> ByteStream {
        let chunks = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect::<Vec<_>>();
        stream::iter(chunks).boxed()
    }

    fn raw_body(chunks: &[&'static [u8]]) -> ByteStream {
        let chunks = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk)))
            .collect::<Vec<_>>();
        stream::iter(chunks).boxed()
    }

    async fn sse(chunks: &[&'static str]) -> Result<Value, ToolError> {
        collect_result(SseFormat.events(body(chunks))).await
    }

    async fn ndjson(chunks: &[&'static str]) -> Result<Value, ToolError> {
        collect_result(NdjsonFormat::new().events(body(chunks))).await
    }

    #[tokio::test]
    async fn sse_result_frame_is_returned() {
        let value = sse(&[
            "event: heartbeat\ndata: {}\n\n",
            "event: result\ndata: {\"result\":{\"ok\":true}}\n\n",
        ])
        .await
        .expect("result frame");
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn sse_heartbeat_only_reports_missing_result() {
        let err = sse(&["event: heartbeat\ndata: {}\n\n"])
            .await
            .expect_err("no result");
        assert_eq!(err.kind(), ErrorKind::Exhaustion);
        assert_eq!(err.message(), "No result received from server");
    }

    #[tokio::test]
    async fn sse_error_frame_stops_before_later_result() {
        let err = sse(&[
            "event: error\ndata: {\"error\":{\"message\":\"slow down\",\"code\":\"RATE_LIMIT_EXCEEDED\",\"details\":{\"retryAfter\":2}}}\n\n",
            "event: result\ndata: {\"result\":1}\n\n",
        ])
        .await
        .expect_err("error frame");
        assert_eq!(err.kind(), ErrorKind::Application);
        assert_eq!(err.message(), "slow down");
        assert_eq!(err.code(), Some(&ErrorCode::RateLimitExceeded));
        assert_eq!(err.details(), Some(&json!({"retryAfter": 2})));
    }

    #[tokio::test]
    async fn sse_malformed_and_unknown_frames_are_skipped() {
        let value = sse(&[
            "event: progress\ndata: {\"pct\":50}\n\n",
            "event: result\ndata: {not json\n\n",
            "event: result\ndata: {\"result\":\"done\"}\n\n",
        ])
        .await
        .expect("valid frame after malformed one");
        assert_eq!(value, json!("done"));
    }

    #[tokio::test]
    async fn sse_frames_split_across_chunks() {
        let value = sse(&["event: res", "ult\ndata: {\"result\":", "[1,2]}\n", "\n"])
            .await
            .expect("reassembled frame");
        assert_eq!(value, json!([1, 2]));
    }

    #[tokio::test]
    async fn ndjson_start_result_end() {
        let value = ndjson(&[
            "{\"type\":\"start\"}\n{\"type\":\"result\",\"result\":{\"x\":1}}\n{\"type\":\"end\"}\n",
        ])
        .await
        .expect("ndjson result");
        assert_eq!(value, json!({"x": 1}));
    }

    #[tokio::test]
    async fn ndjson_end_ignores_trailing_lines() {
        let value = ndjson(&[
            "{\"type\":\"result\",\"result\":1}\n",
            "{\"type\":\"end\"}\n",
            "{\"type\":\"error\",\"error\":{\"message\":\"late\"}}\n",
        ])
        .await
        .expect("end stops iteration");
        assert_eq!(value, json!(1));
    }

    #[tokio::test]
    async fn ndjson_blank_and_malformed_lines_are_skipped() {
        let value = ndjson(&[
            "\n   \n{oops}\n",
            "{\"type\":\"res",
            "ult\",\"result\":\"split\"}\r\n",
        ])
        .await
        .expect("result after noise");
        assert_eq!(value, json!("split"));
    }

    #[tokio::test]
    async fn ndjson_final_line_without_newline_is_read() {
        let value = ndjson(&["{\"type\":\"result\",\"result\":7}"])
            .await
            .expect("unterminated final line");
        assert_eq!(value, json!(7));
    }

    #[tokio::test]
    async fn ndjson_error_line_raises() {
        let err = ndjson(&[
            "{\"type\":\"start\"}\n",
            "{\"type\":\"error\",\"error\":{\"message\":\"bad input\",\"code\":\"VALIDATION_FAILED\"}}\n",
        ])
        .await
        .expect_err("error line");
        assert_eq!(err.code(), Some(&ErrorCode::ValidationFailed));
        assert_eq!(err.message(), "bad input");
    }

    #[tokio::test]
    async fn ndjson_end_without_result_is_exhaustion() {
        let err = ndjson(&["{\"type\":\"start\"}\n{\"type\":\"end\"}\n"])
            .await
            .expect_err("no result");
        assert_eq!(err.kind(), ErrorKind::Exhaustion);
    }

    #[tokio::test]
    async fn body_read_failure_keeps_transport_error() {
        let chunks: Vec<Result<Bytes, ToolError>> = vec![
            Ok(Bytes::from_static(b"{\"type\":\"start\"}\n")),
            Err(ToolError::transport("connection reset by peer")),
        ];
        let err = collect_result(NdjsonFormat::new().events(stream::iter(chunks).boxed()))
            .await
            .expect_err("transport failure");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.message(), "connection reset by peer");
    }

    #[tokio::test]
    async fn sse_null_result_counts_as_missing() {
        let err = sse(&["event: result\ndata: {\"result\":null}\n\n"])
            .await
            .expect_err("null result");
        assert_eq!(err.kind(), ErrorKind::Exhaustion);
        assert_eq!(err.message(), "No result received from server");
    }

    #[tokio::test]
    async fn ndjson_null_result_keeps_earlier_value() {
        let value = ndjson(&[
            "{\"type\":\"result\",\"result\":{\"x\":1}}\n",
            "{\"type\":\"result\",\"result\":null}\n",
        ])
        .await
        .expect("earlier result survives");
        assert_eq!(value, json!({"x": 1}));

        let err = ndjson(&["{\"type\":\"result\",\"result\":null}\n{\"type\":\"end\"}\n"])
            .await
            .expect_err("null result only");
        assert_eq!(err.kind(), ErrorKind::Exhaustion);
    }

    #[tokio::test]
    async fn ndjson_invalid_utf8_line_is_skipped() {
        let events = NdjsonFormat::new().events(raw_body(&[
            b"{\"type\":\"start\"}\n\xff\xfe\n",
            b"{\"type\":\"result\",\"result\":{\"x\":1}}\n",
        ]));
        let value = collect_result(events).await.expect("bad line skipped");
        assert_eq!(value, json!({"x": 1}));
    }

    #[tokio::test]
    async fn ndjson_overlong_line_is_a_final_protocol_error() {
        let events = NdjsonFormat::with_max_line_length(32).events(body(&[
            "{\"type\":\"start\"}\n",
            "{\"type\":\"result\",\"result\":\"",
            "this line never ends and keeps on growing",
        ]));
        let err = collect_result(events).await.expect_err("line too long");
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.message(), "NDJSON line exceeded 32 bytes");
        assert!(!crate::tool_api::error::is_retryable(&err));
    }
}
