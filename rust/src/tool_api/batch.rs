use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool_api::client::ToolClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperation {
    pub tool: String,
    #[serde(default)]
    pub input: Value,
}

impl BatchOperation {
    pub fn new(tool: impl Into<String>, input: Value) -> Self {
        Self {
            tool: tool.into(),
            input,
        }
    }
}

/// Per-operation outcome; serializes as the bare result or `{error, operation}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    Success(Value),
    Failed {
        error: String,
        operation: BatchOperation,
    },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl ToolClient {
    /// Runs every operation concurrently over SSE. Failures never abort the
    /// batch; outcomes come back in input order.
    pub async fn execute_batch(&self, operations: Vec<BatchOperation>) -> Vec<BatchOutcome> {
        let calls = operations
            .iter()
            .map(|op| self.execute_sse(&op.tool, op.input.clone()));
        let results = join_all(calls).await;

        results
            .into_iter()
            .zip(operations)
            .map(|(result, operation)| match result {
                Ok(value) => BatchOutcome::Success(value),
                Err(err) => {
                    tracing::warn!("Batch operation '{}' failed: {err}", operation.tool);
                    BatchOutcome::Failed {
                        error: err.to_string(),
                        operation,
                    }
                }
            })
            .collect()
    }
}
