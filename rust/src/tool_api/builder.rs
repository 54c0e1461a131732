use std::fmt;
use std::time::Duration;

use url::Url;

use crate::tool_api::client::ToolClient;
use crate::tool_api::error::ToolError;
use crate::transport::session::redacted;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connection settings, fixed once the client is built.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_token: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub enable_logging: bool,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: auth_token.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            enable_logging: false,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &redacted(&self.auth_token))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("enable_logging", &self.enable_logging)
            .finish()
    }
}

pub struct ToolClientBuilder {
    config: ClientConfig,
}

impl ToolClientBuilder {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(base_url, auth_token),
        }
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    pub fn build(self) -> Result<ToolClient, ToolError> {
        let mut config = self.config;
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ToolError::config("base url cannot be empty"));
        }
        Url::parse(&base_url)
            .map_err(|err| ToolError::config(format!("Invalid base url '{base_url}': {err}")))?;
        if config.retry_attempts == 0 {
            return Err(ToolError::config("retry attempts must be at least 1"));
        }

        config.base_url = base_url;
        Ok(ToolClient::from_config(config))
    }
}
