use serde::Serialize;
use serde_json::{json, Value};

use crate::tool_api::client::ToolClient;
use crate::tool_api::error::ToolError;

pub const TOOL_CHANGE_OPEN: &str = "change.open";
pub const TOOL_CHANGE_ARCHIVE: &str = "change.archive";
pub const TOOL_CHANGES_ACTIVE: &str = "changes.active";

const DEFAULT_TEMPLATE: &str = "feature";
const DEFAULT_ACTIVE_LIMIT: u32 = 50;

/// Optional fields of `change.open`; unset values are sent as `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeOptions {
    pub template: Option<String>,
    pub rationale: Option<String>,
    pub owner: Option<String>,
    pub ttl: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateChange {
    pub title: String,
    pub slug: String,
    pub template: String,
    pub rationale: Option<String>,
    pub owner: Option<String>,
    pub ttl: Option<u64>,
}

impl CreateChange {
    pub fn new(title: impl Into<String>, slug: impl Into<String>, options: ChangeOptions) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            template: options
                .template
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            rationale: options.rationale,
            owner: options.owner,
            ttl: options.ttl,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ActiveChangesQuery {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ActiveChangesQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ACTIVE_LIMIT,
            offset: 0,
        }
    }
}

impl ToolClient {
    /// Serializes `input` and runs `tool` over SSE.
    pub async fn call_struct<T: Serialize>(&self, tool: &str, input: &T) -> Result<Value, ToolError> {
        let value = serde_json::to_value(input).map_err(|err| {
            ToolError::config(format!(
                "Failed to serialize typed input for tool '{tool}': {err}"
            ))
        })?;
        self.execute_sse(tool, value).await
    }

    pub async fn create_change(
        &self,
        title: &str,
        slug: &str,
        options: ChangeOptions,
    ) -> Result<Value, ToolError> {
        self.call_struct(TOOL_CHANGE_OPEN, &CreateChange::new(title, slug, options))
            .await
    }

    pub async fn archive_change(&self, slug: &str) -> Result<Value, ToolError> {
        self.execute_sse(TOOL_CHANGE_ARCHIVE, json!({ "slug": slug }))
            .await
    }

    pub async fn get_active_changes(&self, query: ActiveChangesQuery) -> Result<Value, ToolError> {
        self.call_struct(TOOL_CHANGES_ACTIVE, &query).await
    }
}
