/// `query_graph` tool: run a parameterized graph query against stored
/// relationships.
///
/// Grounded on `tools/query_graph.py`, with the tool/client call signature
/// unified on `(query, parameters, limit)` — the Python source's tool
/// wrapper and client method disagreed on argument order and naming
/// (spec.md §9 source bug #5). Runs in read-only mode: queries containing
/// a write keyword are rejected before they ever reach the backend.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::VerisClient;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

/// Write keywords rejected while the tool runs in read-only mode.
const DANGEROUS_KEYWORDS: &[&str] = &["CREATE", "DELETE", "SET", "REMOVE", "MERGE", "DROP", "DETACH"];

pub struct QueryGraphTool {
    client: Arc<VerisClient>,
    config: ToolConfig,
}

impl QueryGraphTool {
    pub fn new(client: Arc<VerisClient>, config: ToolConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Tool for QueryGraphTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("query".to_string(), ToolParameter::new("string", "Graph query expression"));
        properties.insert("parameters".to_string(), ToolParameter::new("object", "Named parameters bound into the query"));
        properties.insert(
            "limit".to_string(),
            ToolParameter::new("integer", "Maximum results to return")
                .with_default(Value::from(10))
                .with_bounds(Some(1.0), Some(self.config.max_results as f64)),
        );
        build_descriptor(
            "query_graph",
            "Run a parameterized query against the context relationship graph",
            properties,
            vec!["query".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("query_graph is disabled", "tool_disabled"));
        }
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: query"))?;
        if query.trim().is_empty() {
            return Err(ToolError::validation("Query cannot be empty"));
        }

        let query_upper = query.to_uppercase();
        if let Some(keyword) = DANGEROUS_KEYWORDS.iter().find(|k| query_upper.contains(**k)) {
            return Err(ToolError::validation(format!(
                "Write operations ({keyword}) not allowed in read-only mode"
            )));
        }

        let parameters = arguments.get("parameters").cloned();
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .min(self.config.max_results as u64) as u32;

        let response = self
            .client
            .query_graph(query, parameters, limit)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        Ok(ToolResult::success("Graph query results", Some(response), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangerous_keyword_is_case_insensitive() {
        let query = "match (n) Detach delete n";
        let upper = query.to_uppercase();
        assert!(DANGEROUS_KEYWORDS.iter().any(|k| upper.contains(*k)));
    }

    #[test]
    fn plain_match_has_no_dangerous_keyword() {
        let query = "MATCH (n) RETURN n";
        let upper = query.to_uppercase();
        assert!(!DANGEROUS_KEYWORDS.iter().any(|k| upper.contains(*k)));
    }
}
