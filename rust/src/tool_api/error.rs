use std::fmt;

use serde_json::Value;

const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Where a [`ToolError`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client construction or request encoding failed before any I/O.
    Config,
    /// Connection, DNS, timeout, or body read failure from the HTTP layer.
    Transport,
    /// Non-2xx HTTP response or a stream that could not be framed.
    Protocol,
    /// The remote tool reported an `error` event.
    Application,
    /// The stream ended without a `result` or `error`.
    Exhaustion,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    RateLimitExceeded,
    InternalError,
    Timeout,
    ConnectionError,
    ValidationFailed,
    NotFound,
    Unauthorized,
    Other(String),
}

impl ErrorCode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "RATE_LIMIT_EXCEEDED" => Self::RateLimitExceeded,
            "INTERNAL_ERROR" => Self::InternalError,
            "TIMEOUT" => Self::Timeout,
            "CONNECTION_ERROR" => Self::ConnectionError,
            "VALIDATION_FAILED" => Self::ValidationFailed,
            "NOT_FOUND" => Self::NotFound,
            "UNAUTHORIZED" => Self::Unauthorized,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::InternalError | Self::Timeout | Self::ConnectionError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error shape returned by every client operation.
#[derive(Debug, Clone)]
pub struct ToolError {
    kind: ErrorKind,
    message: String,
    code: Option<ErrorCode>,
    details: Option<Value>,
    status: Option<u16>,
}

impl ToolError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            details: None,
            status: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, message)
    }

    pub fn no_result() -> Self {
        Self::new(ErrorKind::Exhaustion, "No result received from server")
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            Some(ErrorCode::Timeout)
        } else if err.is_connect() {
            Some(ErrorCode::ConnectionError)
        } else {
            None
        };
        let mut error = Self::transport(err.to_string());
        error.code = code;
        if let Some(status) = err.status() {
            error.status = Some(status.as_u16());
        }
        error
    }

    pub fn with_code(mut self, code: Option<ErrorCode>) -> Self {
        self.code = code;
        self
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.details = details;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn with_context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// HTTP status, present only on errors translated from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ToolError {}

/// Decides whether a failed attempt is worth repeating.
pub fn is_retryable(err: &ToolError) -> bool {
    if let Some(code) = &err.code {
        return code.is_retryable();
    }

    match err.kind {
        ErrorKind::Transport => true,
        // Tool-reported errors without a code are final.
        ErrorKind::Config | ErrorKind::Exhaustion | ErrorKind::Application => false,
        ErrorKind::Protocol
            if err
                .status
                .is_some_and(|status| RETRYABLE_STATUS_CODES.contains(&status)) =>
        {
            true
        }
        ErrorKind::Protocol => {
            let message = err.message.to_ascii_lowercase();
            message.contains("timeout") || message.contains("connection")
        }
    }
}
