/// `upsert_fact` tool: create or update a durable user fact.
///
/// Grounded on `tools/upsert_fact.py`.
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

pub struct UpsertFactTool {
    client: Arc<VerisClient>,
    cache: Arc<RwLock<Cache>>,
    config: ToolConfig,
}

impl UpsertFactTool {
    pub fn new(client: Arc<VerisClient>, cache: Arc<RwLock<Cache>>, config: ToolConfig) -> Self {
        Self { client, cache, config }
    }
}

#[async_trait]
impl Tool for UpsertFactTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("fact_key".to_string(), ToolParameter::new("string", "Fact identifier, e.g. 'favorite_language'"));
        properties.insert("fact_value".to_string(), ToolParameter::new("string", "Fact value"));
        properties.insert("user_id".to_string(), ToolParameter::new("string", "User the fact belongs to; defaults to the configured user"));
        properties.insert("metadata".to_string(), ToolParameter::new("object", "Optional metadata"));
        properties.insert(
            "create_relationships".to_string(),
            ToolParameter::new("boolean", "Also create graph relationships for this fact").with_default(Value::Bool(false)),
        );
        build_descriptor(
            "upsert_fact",
            "Create or update a durable fact about a user",
            properties,
            vec!["fact_key".to_string(), "fact_value".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("upsert_fact is disabled", "tool_disabled"));
        }
        let fact_key = arguments
            .get("fact_key")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: fact_key"))?;
        let fact_value = arguments
            .get("fact_value")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: fact_value"))?;
        if fact_key.trim().is_empty() {
            return Err(ToolError::validation("fact_key cannot be empty"));
        }
        if fact_value.trim().is_empty() {
            return Err(ToolError::validation("fact_value cannot be empty"));
        }
        let user_id = arguments.get("user_id").and_then(Value::as_str);
        let metadata = arguments.get("metadata").cloned();
        let create_relationships = arguments.get("create_relationships").and_then(Value::as_bool).unwrap_or(false);

        let response = self
            .client
            .upsert_fact(fact_key, fact_value, user_id, metadata, create_relationships)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        self.cache.write().await.invalidate_all();
        Ok(ToolResult::success(format!("Upserted fact {fact_key}"), Some(response), None))
    }
}
