use serde::Serialize;
use serde_json::Value;

use crate::tool_api::error::{ErrorCode, ErrorKind, ToolError};

pub const API_VERSION: &str = "1.0.0";

const DEFAULT_ERROR_MESSAGE: &str = "Tool execution error";

/// Body of `POST /sse` and `POST /mcp`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRequest {
    pub tool: String,
    pub input: Value,
    #[serde(rename = "apiVersion")]
    pub api_version: &'static str,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>, input: Value) -> Self {
        Self {
            tool: tool.into(),
            input,
            api_version: API_VERSION,
        }
    }
}

/// `{message, code, details}` as carried by `error` frames and error bodies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorPayload {
    pub message: Option<String>,
    pub code: Option<String>,
    pub details: Option<Value>,
}

impl ErrorPayload {
    /// Reads the `error` member of an envelope. A bare string is taken as the message.
    pub fn from_envelope(envelope: &Value) -> Self {
        match envelope.get("error") {
            Some(Value::Object(obj)) => Self {
                message: obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                code: obj.get("code").and_then(Value::as_str).map(str::to_string),
                details: obj.get("details").filter(|value| !value.is_null()).cloned(),
            },
            Some(Value::String(message)) => Self {
                message: Some(message.clone()),
                ..Default::default()
            },
            _ => Self::default(),
        }
    }

    pub fn into_error(self) -> ToolError {
        self.into_error_of(ErrorKind::Application, DEFAULT_ERROR_MESSAGE)
    }

    pub(crate) fn into_error_of(self, kind: ErrorKind, default_message: &str) -> ToolError {
        ToolError::new(
            kind,
            self.message
                .unwrap_or_else(|| default_message.to_string()),
        )
        .with_code(self.code.as_deref().map(ErrorCode::parse))
        .with_details(self.details)
    }
}

/// One decoded frame of a tool-execution stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start,
    Heartbeat,
    Result(Value),
    Error(ErrorPayload),
    End,
}
