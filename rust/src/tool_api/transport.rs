use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;

use crate::tool_api::error::{ErrorKind, ToolError};
use crate::tool_api::protocol::{ErrorPayload, ToolRequest};
use crate::tool_api::stream::{collect_result, NdjsonFormat, SseFormat, StreamFormat};

static NDJSON_FORMAT: NdjsonFormat = NdjsonFormat::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Sse,
    Ndjson,
}

impl Transport {
    pub fn format(self) -> &'static dyn StreamFormat {
        match self {
            Self::Sse => &SseFormat,
            Self::Ndjson => &NDJSON_FORMAT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::Ndjson => "ndjson",
        }
    }
}

/// One attempt: POST the request and fold the streamed body into a result.
pub(crate) async fn execute_once(
    http: &reqwest::Client,
    url: &str,
    format: &dyn StreamFormat,
    request: &ToolRequest,
) -> Result<Value, ToolError> {
    let response = http
        .post(url)
        .header(ACCEPT, format.accept())
        .json(request)
        .send()
        .await
        .map_err(ToolError::from_reqwest)?;

    if !response.status().is_success() {
        return Err(translate_http_error(response).await);
    }

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(ToolError::from_reqwest))
        .boxed();
    collect_result(format.events(body)).await
}

pub(crate) async fn get_json(
    http: &reqwest::Client,
    url: &str,
    context: &str,
) -> Result<Value, ToolError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(ToolError::from_reqwest)?;

    if !response.status().is_success() {
        return Err(translate_http_error(response).await.with_context(context));
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| ToolError::protocol(format!("Response was not JSON: {err}")))
}

pub(crate) async fn translate_http_error(response: reqwest::Response) -> ToolError {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"));
    let body = response.bytes().await.unwrap_or_default();
    map_http_status_error(status, is_json, &body)
}

fn map_http_status_error(status: StatusCode, is_json: bool, body: &[u8]) -> ToolError {
    let parsed = is_json
        .then(|| serde_json::from_slice::<Value>(body).ok())
        .flatten();

    let Some(envelope) = parsed else {
        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        return ToolError::protocol(format!("HTTP {}: {reason}", status.as_u16()))
            .with_status(status.as_u16());
    };

    ErrorPayload::from_envelope(&envelope)
        .into_error_of(ErrorKind::Protocol, &format!("HTTP {}", status.as_u16()))
        .with_status(status.as_u16())
}
