/// `list_context_types` tool: enumerate the backend's supported context
/// types with human-readable descriptions.
///
/// Grounded on `tools/list_context_types.py`, with curated descriptions
/// rewritten for the five types the backend actually supports rather than
/// the Python source's descriptions for type names that don't exist in the
/// mapping policy (spec.md §9 source bug #6).
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::VerisClient;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

pub struct ListContextTypesTool {
    client: Arc<VerisClient>,
    config: ToolConfig,
}

impl ListContextTypesTool {
    pub fn new(client: Arc<VerisClient>, config: ToolConfig) -> Self {
        Self { client, config }
    }
}

fn describe(type_name: &str) -> &'static str {
    match type_name {
        "design" => "Architectural and design decisions",
        "decision" => "Decisions made during development, with rationale",
        "trace" => "Debugging traces and investigation history",
        "sprint" => "Sprint planning, summaries, and retrospectives",
        "log" => "General-purpose log entries; the default for unmapped types",
        _ => "Backend-defined context type",
    }
}

#[async_trait]
impl Tool for ListContextTypesTool {
    fn descriptor(&self) -> ToolDescriptor {
        build_descriptor(
            "list_context_types",
            "List the context types supported by the memory backend",
            HashMap::new(),
            Vec::new(),
        )
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("list_context_types is disabled", "tool_disabled"));
        }

        let types = self
            .client
            .list_context_types()
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        let described: Vec<Value> = types
            .iter()
            .map(|t| serde_json::json!({ "type": t, "description": describe(t) }))
            .collect();

        Ok(ToolResult::success(
            "Supported context types",
            Some(serde_json::json!({ "types": described })),
            None,
        ))
    }
}
