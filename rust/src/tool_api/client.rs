use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::tool_api::builder::{ClientConfig, ToolClientBuilder};
use crate::tool_api::error::{is_retryable, ToolError};
use crate::tool_api::protocol::ToolRequest;
use crate::tool_api::stream::StreamFormat;
use crate::tool_api::transport::{execute_once, get_json, Transport};
use crate::transport::reliability::{run_with_retry, RetryPolicy};
use crate::transport::session::{Session, SessionOptions};

const HEALTH_PATH: &str = "/healthz";
const METRICS_PATH: &str = "/security/metrics";

/// Client for a Task MCP server. Cloning shares the underlying session.
#[derive(Clone)]
pub struct ToolClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    session: Session,
}

impl ToolClient {
    pub fn builder(base_url: impl Into<String>, auth_token: impl Into<String>) -> ToolClientBuilder {
        ToolClientBuilder::new(base_url, auth_token)
    }

    pub(crate) fn from_config(config: ClientConfig) -> Self {
        let session = Session::new(SessionOptions {
            auth_token: config.auth_token.clone(),
            connect_timeout: config.connect_timeout,
            request_timeout: config.timeout,
            log_lifecycle: config.enable_logging,
        });
        Self {
            inner: Arc::new(ClientInner { config, session }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn execute_sse(&self, tool: &str, input: Value) -> Result<Value, ToolError> {
        self.execute(Transport::Sse, tool, input).await
    }

    pub async fn execute_ndjson(&self, tool: &str, input: Value) -> Result<Value, ToolError> {
        self.execute(Transport::Ndjson, tool, input).await
    }

    pub async fn execute(
        &self,
        transport: Transport,
        tool: &str,
        input: Value,
    ) -> Result<Value, ToolError> {
        self.execute_with(transport.format(), tool, input).await
    }

    /// Runs `tool` over any framing, retrying per the configured policy.
    pub async fn execute_with(
        &self,
        format: &dyn StreamFormat,
        tool: &str,
        input: Value,
    ) -> Result<Value, ToolError> {
        let http = self.inner.session.ensure().await?;
        let url = self.endpoint(format.path());
        let request = ToolRequest::new(tool, input);
        let label = format!("Tool '{tool}'");
        let started = Instant::now();

        let result = run_with_retry(&label, self.retry_policy(), is_retryable, || {
            execute_once(&http, &url, format, &request)
        })
        .await?;

        if self.inner.config.enable_logging {
            tracing::info!(
                "Tool '{tool}' executed in {:.2}s",
                started.elapsed().as_secs_f64()
            );
        }
        Ok(result)
    }

    pub async fn health_check(&self) -> Result<Value, ToolError> {
        let http = self.inner.session.ensure().await?;
        get_json(&http, &self.endpoint(HEALTH_PATH), "Health check failed").await
    }

    /// Server security metrics; relies on the session's bearer token.
    pub async fn get_metrics(&self) -> Result<Value, ToolError> {
        let http = self.inner.session.ensure().await?;
        get_json(&http, &self.endpoint(METRICS_PATH), "Failed to get metrics").await
    }

    pub async fn close(&self) {
        self.inner.session.close().await;
    }

    pub async fn is_open(&self) -> bool {
        self.inner.session.is_open().await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.inner.config.base_url)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.inner.config.retry_attempts,
            self.inner.config.retry_delay,
        )
    }
}
