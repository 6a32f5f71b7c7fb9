/// `forget_context` tool: schedule a context entry for retention-bound
/// removal rather than deleting it outright.
///
/// Grounded on `tools/forget_context.py`, with `retention_days` restored
/// as an explicit, optional parameter (default 30) instead of being
/// dropped from the schema despite being implied by the backend contract
/// (spec.md §9 source bug #4).
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

const DEFAULT_RETENTION_DAYS: u64 = 30;

pub struct ForgetContextTool {
    client: Arc<VerisClient>,
    cache: Arc<RwLock<Cache>>,
    config: ToolConfig,
}

impl ForgetContextTool {
    pub fn new(client: Arc<VerisClient>, cache: Arc<RwLock<Cache>>, config: ToolConfig) -> Self {
        Self { client, cache, config }
    }
}

#[async_trait]
impl Tool for ForgetContextTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("context_id".to_string(), ToolParameter::new("string", "Identifier of the context to forget"));
        properties.insert(
            "retention_days".to_string(),
            ToolParameter::new("integer", "Days to retain before permanent removal")
                .with_default(Value::from(DEFAULT_RETENTION_DAYS))
                .with_bounds(Some(0.0), None),
        );
        properties.insert("reason".to_string(), ToolParameter::new("string", "Optional reason recorded alongside the request"));
        build_descriptor(
            "forget_context",
            "Mark a context entry for retention-bound removal",
            properties,
            vec!["context_id".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("forget_context is disabled", "tool_disabled"));
        }
        let context_id = arguments
            .get("context_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: context_id"))?;
        let retention_days = arguments.get("retention_days").and_then(Value::as_u64).unwrap_or(DEFAULT_RETENTION_DAYS) as u32;
        let reason = arguments.get("reason").and_then(Value::as_str);

        let response = self
            .client
            .forget_context(context_id, retention_days, reason)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        self.cache.write().await.invalidate_all();
        Ok(ToolResult::success(format!("Scheduled {context_id} to be forgotten"), Some(response), None))
    }
}
