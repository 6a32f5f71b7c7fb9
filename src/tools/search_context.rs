/// `search_context` tool: filter-driven context search, distinct from
/// `retrieve_context`'s free-text semantic lookup.
///
/// Grounded on `tools/search_context.py`.
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

pub struct SearchContextTool {
    client: Arc<VerisClient>,
    cache: Arc<RwLock<Cache>>,
    config: ToolConfig,
}

impl SearchContextTool {
    pub fn new(client: Arc<VerisClient>, cache: Arc<RwLock<Cache>>, config: ToolConfig) -> Self {
        Self { client, cache, config }
    }
}

#[async_trait]
impl Tool for SearchContextTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("query".to_string(), ToolParameter::new("string", "Search query"));
        properties.insert("filters".to_string(), ToolParameter::new("object", "Structured filters (type, tags, date range)"));
        properties.insert(
            "limit".to_string(),
            ToolParameter::new("integer", "Maximum results to return")
                .with_default(Value::from(self.config.default_limit))
                .with_bounds(Some(1.0), Some(self.config.max_results as f64)),
        );
        build_descriptor(
            "search_context",
            "Search stored context with structured filters",
            properties,
            vec!["query".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or("");
        let filters = arguments.get("filters").cloned().unwrap_or_else(|| serde_json::json!({}));
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.default_limit as u64)
            .min(self.config.max_results as u64) as u32;

        let cache_key = Cache::key("search_context", &serde_json::json!({"query": query, "filters": filters, "limit": limit}));
        if let Some(cached) = self.cache.write().await.get(&cache_key) {
            return Ok(ToolResult::success("Search results (cached)", Some(cached), None));
        }

        let response = self
            .client
            .search_context(query, filters, limit)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        self.cache.write().await.put(cache_key, response.clone());
        Ok(ToolResult::success("Search results", Some(response), None))
    }
}
