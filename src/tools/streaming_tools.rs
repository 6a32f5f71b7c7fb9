/// `streaming_search` and `batch_operations` tools: paginated retrieval and
/// bounded-concurrency bulk writes.
///
/// Grounded on `tools/streaming_tools.py` and `streaming/engine.py`.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::VerisClient;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::streaming::StreamingEngine;
use crate::tools::base::{build_descriptor, Tool};

pub struct StreamingSearchTool {
    client: Arc<VerisClient>,
    engine: Arc<StreamingEngine>,
    config: ToolConfig,
}

impl StreamingSearchTool {
    pub fn new(client: Arc<VerisClient>, engine: Arc<StreamingEngine>, config: ToolConfig) -> Self {
        Self { client, engine, config }
    }
}

#[async_trait]
impl Tool for StreamingSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("query".to_string(), ToolParameter::new("string", "Search query"));
        properties.insert("type".to_string(), ToolParameter::new("string", "Filter by context type"));
        properties.insert(
            "chunk_size".to_string(),
            ToolParameter::new("integer", "Results per page").with_default(Value::from(100)).with_bounds(Some(1.0), Some(1000.0)),
        );
        build_descriptor(
            "streaming_search",
            "Search stored context, paginating through results",
            properties,
            vec!["query".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("streaming_search is disabled", "tool_disabled"));
        }
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or("").to_string();
        let context_type = arguments.get("type").and_then(Value::as_str).map(str::to_string);
        let chunk_size = arguments.get("chunk_size").and_then(Value::as_u64).map(|v| v as u32);

        let client = Arc::clone(&self.client);
        let chunks = self
            .engine
            .stream_search_results(chunk_size, move |offset, size| {
                let client = Arc::clone(&client);
                let query = query.clone();
                let context_type = context_type.clone();
                async move {
                    let response = client
                        .retrieve_context(&query, size, context_type.as_deref(), None)
                        .await?;
                    let items = response
                        .get("results")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    let page: Vec<Value> = items.into_iter().skip(offset as usize).take(size as usize).collect();
                    Ok(page)
                }
            })
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        Ok(ToolResult::success(
            format!("Streamed {} page(s)", chunks.len()),
            Some(serde_json::to_value(&chunks).unwrap_or_default()),
            None,
        ))
    }
}

pub struct BatchOperationsTool {
    client: Arc<VerisClient>,
    engine: Arc<StreamingEngine>,
    config: ToolConfig,
}

impl BatchOperationsTool {
    pub fn new(client: Arc<VerisClient>, engine: Arc<StreamingEngine>, config: ToolConfig) -> Self {
        Self { client, engine, config }
    }
}

#[async_trait]
impl Tool for BatchOperationsTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert(
            "operation".to_string(),
            ToolParameter::new("string", "Batch operation to perform").with_enum(vec!["store".to_string(), "update".to_string()]),
        );
        properties.insert("items".to_string(), ToolParameter::new("array", "Items to process"));
        properties.insert(
            "concurrency".to_string(),
            ToolParameter::new("integer", "Maximum concurrent items").with_default(Value::from(10)).with_bounds(Some(1.0), Some(100.0)),
        );
        build_descriptor(
            "batch_operations",
            "Store or update many context entries concurrently",
            properties,
            vec!["operation".to_string(), "items".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("batch_operations is disabled", "tool_disabled"));
        }
        let operation = arguments
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: operation"))?
            .to_string();
        let items = arguments
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::validation("Missing required parameter: items"))?
            .clone();
        let concurrency = arguments.get("concurrency").and_then(Value::as_u64).unwrap_or(10) as usize;

        let client = Arc::clone(&self.client);
        let result = self
            .engine
            .run_batch(items, concurrency, move |_index, item| {
                let client = Arc::clone(&client);
                let operation = operation.clone();
                async move {
                    let content = item.get("content").cloned().unwrap_or(Value::Null);
                    let context_type = item.get("type").and_then(Value::as_str).unwrap_or("log");
                    let metadata = item.get("metadata").cloned().unwrap_or_else(|| serde_json::json!({ "batch_operation": operation }));
                    client.store_context(context_type, content, metadata).await
                }
            })
            .await;

        Ok(ToolResult::success(
            format!("Batch completed: {} succeeded, {} failed", result.succeeded, result.failed),
            Some(serde_json::to_value(&result).unwrap_or_default()),
            None,
        ))
    }
}
