use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::Mutex;

use crate::tool_api::ToolError;

/// Options the underlying HTTP client is built from.
#[derive(Clone)]
pub struct SessionOptions {
    pub auth_token: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub log_lifecycle: bool,
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("auth_token", &redacted(&self.auth_token))
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("log_lifecycle", &self.log_lifecycle)
            .finish()
    }
}

/// Owns the one outbound HTTP client shared by every call.
///
/// The client is created on first use and dropped by [`Session::close`];
/// a later [`Session::ensure`] builds a fresh one.
pub struct Session {
    options: SessionOptions,
    client: Mutex<Option<reqwest::Client>>,
    #[cfg(test)]
    builds: std::sync::atomic::AtomicUsize,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            client: Mutex::new(None),
            #[cfg(test)]
            builds: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub async fn ensure(&self) -> Result<reqwest::Client, ToolError> {
        let mut slot = self.client.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }

        let client = build_client(&self.options)?;
        #[cfg(test)]
        self.builds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tracing::debug!("Opened HTTP session");
        *slot = Some(client.clone());
        Ok(client)
    }

    pub async fn close(&self) {
        let released = self.client.lock().await.take();
        if released.is_some() && self.options.log_lifecycle {
            tracing::info!("Task MCP client closed");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.client.lock().await.is_some()
    }
}

pub(crate) fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

fn build_client(options: &SessionOptions) -> Result<reqwest::Client, ToolError> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", options.auth_token))
        .map_err(|err| ToolError::config(format!("Invalid auth token: {err}")))?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(options.connect_timeout)
        .timeout(options.request_timeout)
        .build()
        .map_err(|err| ToolError::config(format!("Failed to build HTTP client: {err}")))
}
