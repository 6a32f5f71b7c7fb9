/// `update_scratchpad` and `get_agent_state` tools: an agent's working
/// memory, separate from the durable context store.
///
/// Grounded on `tools/update_scratchpad.py`/`tools/get_agent_state.py`,
/// with both signatures unified with `query_graph`'s fix (spec.md §9
/// source bug #5) and `include_recent_contexts` restored to
/// `get_agent_state` after being dropped from the distilled schema.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::VerisClient;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

/// Scratchpad content is capped well below `store_context`'s limit; this
/// is working memory, not the durable store.
const MAX_SCRATCHPAD_BYTES: usize = 64 * 1024;

pub struct UpdateScratchpadTool {
    client: Arc<VerisClient>,
    config: ToolConfig,
}

impl UpdateScratchpadTool {
    pub fn new(client: Arc<VerisClient>, config: ToolConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Tool for UpdateScratchpadTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("agent_id".to_string(), ToolParameter::new("string", "Agent whose scratchpad is being updated"));
        properties.insert("content".to_string(), ToolParameter::new("object", "Scratchpad content"));
        properties.insert(
            "merge".to_string(),
            ToolParameter::new("boolean", "Merge into existing content instead of replacing it").with_default(Value::Bool(true)),
        );
        build_descriptor(
            "update_scratchpad",
            "Update an agent's working scratchpad",
            properties,
            vec!["agent_id".to_string(), "content".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("update_scratchpad is disabled", "tool_disabled"));
        }
        let agent_id = arguments
            .get("agent_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: agent_id"))?;
        let content = arguments.get("content").cloned().unwrap_or_else(|| serde_json::json!({}));
        let merge = arguments.get("merge").and_then(Value::as_bool).unwrap_or(true);

        let size = serde_json::to_string(&content).map(|s| s.len()).unwrap_or(0);
        if size > MAX_SCRATCHPAD_BYTES {
            return Err(ToolError::validation(format!(
                "scratchpad content exceeds {MAX_SCRATCHPAD_BYTES} bytes"
            )));
        }

        let response = self
            .client
            .update_scratchpad(agent_id, content, merge)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        Ok(ToolResult::success(format!("Updated scratchpad for {agent_id}"), Some(response), None))
    }
}

pub struct GetAgentStateTool {
    client: Arc<VerisClient>,
    config: ToolConfig,
}

impl GetAgentStateTool {
    pub fn new(client: Arc<VerisClient>, config: ToolConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Tool for GetAgentStateTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("agent_id".to_string(), ToolParameter::new("string", "Agent to fetch state for"));
        properties.insert(
            "include_scratchpad".to_string(),
            ToolParameter::new("boolean", "Include the agent's current scratchpad").with_default(Value::Bool(true)),
        );
        properties.insert(
            "include_recent_contexts".to_string(),
            ToolParameter::new("boolean", "Include recently stored context for this agent").with_default(Value::Bool(false)),
        );
        build_descriptor(
            "get_agent_state",
            "Fetch an agent's scratchpad and recent activity",
            properties,
            vec!["agent_id".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("get_agent_state is disabled", "tool_disabled"));
        }
        let agent_id = arguments
            .get("agent_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: agent_id"))?;
        let include_scratchpad = arguments.get("include_scratchpad").and_then(Value::as_bool).unwrap_or(true);
        let include_recent_contexts = arguments.get("include_recent_contexts").and_then(Value::as_bool).unwrap_or(false);

        let response = self
            .client
            .get_agent_state(agent_id, include_scratchpad, include_recent_contexts)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        Ok(ToolResult::success(format!("State for {agent_id}"), Some(response), None))
    }
}
