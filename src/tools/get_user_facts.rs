/// `get_user_facts` tool: list known facts about a user.
///
/// Grounded on `tools/get_user_facts.py`. Clamps `limit` to `[1, 200]`
/// (spec.md's authoritative ceiling) rather than the Python source's
/// looser `[1, 1000]` (spec.md §9 source bug #3).
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::VerisClient;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

const MAX_LIMIT: u64 = 200;

pub struct GetUserFactsTool {
    client: Arc<VerisClient>,
    config: ToolConfig,
}

impl GetUserFactsTool {
    pub fn new(client: Arc<VerisClient>, config: ToolConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Tool for GetUserFactsTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("user_id".to_string(), ToolParameter::new("string", "User to fetch facts for"));
        properties.insert(
            "limit".to_string(),
            ToolParameter::new("integer", "Maximum facts to return")
                .with_default(Value::from(50))
                .with_bounds(Some(1.0), Some(MAX_LIMIT as f64)),
        );
        properties.insert(
            "include_forgotten".to_string(),
            ToolParameter::new("boolean", "Include facts that were previously forgotten").with_default(Value::Bool(false)),
        );
        build_descriptor(
            "get_user_facts",
            "List known facts about a user",
            properties,
            vec!["user_id".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("get_user_facts is disabled", "tool_disabled"));
        }
        let user_id = arguments
            .get("user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: user_id"))?;
        let limit = arguments.get("limit").and_then(Value::as_u64).unwrap_or(50).clamp(1, MAX_LIMIT) as u32;
        let include_forgotten = arguments.get("include_forgotten").and_then(Value::as_bool).unwrap_or(false);

        let response = self
            .client
            .get_user_facts(user_id, limit, include_forgotten)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        Ok(ToolResult::success(format!("Facts for {user_id}"), Some(response), None))
    }
}
