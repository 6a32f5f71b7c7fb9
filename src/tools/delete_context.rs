/// `delete_context` tool: permanently remove a stored context entry.
///
/// Grounded on `tools/delete_context.py`. Routed through the same pooled
/// `VerisClient` as every other tool, not a second, never-constructed
/// client handle (spec.md §9 source bug #1). Deletion is permanent and
/// requires an explicit `confirm=true`.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::Cache;
use crate::client::VerisClient;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

pub struct DeleteContextTool {
    client: Arc<VerisClient>,
    cache: Arc<RwLock<Cache>>,
    config: ToolConfig,
}

impl DeleteContextTool {
    pub fn new(client: Arc<VerisClient>, cache: Arc<RwLock<Cache>>, config: ToolConfig) -> Self {
        Self { client, cache, config }
    }
}

#[async_trait]
impl Tool for DeleteContextTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("context_id".to_string(), ToolParameter::new("string", "Identifier of the context to delete"));
        properties.insert(
            "confirm".to_string(),
            ToolParameter::new("boolean", "Confirmation that you want to delete this context"),
        );
        build_descriptor(
            "delete_context",
            "Permanently delete a stored context entry",
            properties,
            vec!["context_id".to_string(), "confirm".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("delete_context is disabled", "tool_disabled"));
        }
        let context_id = arguments
            .get("context_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: context_id"))?;
        if context_id.trim().is_empty() {
            return Err(ToolError::validation("Context ID cannot be empty"));
        }
        let confirm = arguments.get("confirm").and_then(Value::as_bool).unwrap_or(false);
        if !confirm {
            return Err(ToolError::validation("Deletion requires explicit confirmation"));
        }

        let response = self
            .client
            .delete_context(context_id)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        self.cache.write().await.invalidate_all();
        Ok(ToolResult::success(format!("Deleted context {context_id}"), Some(response), None))
    }
}
