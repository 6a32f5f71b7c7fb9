/// `retrieve_context` tool: semantic lookup of previously stored context.
///
/// Grounded on `tools/retrieve_context.py`, with the leftover
/// `logger.error("!!!!! ...")` debug cruft left out entirely (spec.md §9
/// source bug #8) in favor of ordinary `tracing` calls. Results are served
/// from the operation-keyed cache when present, formatted with an
/// extracted title/summary per entry, and sorted by relevance score
/// descending.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::Cache;
use crate::client::VerisClient;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

pub struct RetrieveContextTool {
    client: Arc<VerisClient>,
    cache: Arc<RwLock<Cache>>,
    config: ToolConfig,
}

impl RetrieveContextTool {
    pub fn new(client: Arc<VerisClient>, cache: Arc<RwLock<Cache>>, config: ToolConfig) -> Self {
        Self { client, cache, config }
    }
}

const TITLE_FIELDS: &[&str] = &["title", "name", "subject", "summary"];
const SUMMARY_FIELDS: &[&str] = &["summary", "description", "text", "content"];

fn extract_title(context: &Value) -> String {
    let content = context.get("content");
    if let Some(map) = content.and_then(Value::as_object) {
        for field in TITLE_FIELDS {
            if let Some(s) = map.get(*field).and_then(Value::as_str) {
                if !s.is_empty() {
                    return s.chars().take(100).collect();
                }
            }
        }
    }

    let content_type = content
        .and_then(Value::as_object)
        .and_then(|m| m.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("Context");
    let id = context.get("id").and_then(Value::as_str).unwrap_or("unknown");
    let short_id: String = id.chars().take(8).collect();
    format!("{content_type} ({short_id})")
}

fn extract_summary(context: &Value) -> String {
    if let Some(map) = context.get("content").and_then(Value::as_object) {
        for field in SUMMARY_FIELDS {
            if let Some(text) = map.get(*field).and_then(Value::as_str) {
                if text.is_empty() {
                    continue;
                }
                if let Some((first_sentence, _)) = text.split_once('.') {
                    let candidate = format!("{first_sentence}.");
                    if candidate.len() <= 200 {
                        return candidate;
                    }
                }
                let char_count = text.chars().count();
                return if char_count > 200 {
                    format!("{}...", text.chars().take(200).collect::<String>())
                } else {
                    text.to_string()
                };
            }
        }
    }
    "No summary available".to_string()
}

/// Attaches title/summary to each raw context and sorts by
/// `relevance_score` descending.
fn format_contexts(mut contexts: Vec<Value>) -> Vec<Value> {
    for context in &mut contexts {
        let title = extract_title(context);
        let summary = extract_summary(context);
        if let Value::Object(map) = context {
            map.insert("title".to_string(), Value::String(title));
            map.insert("summary".to_string(), Value::String(summary));
        }
    }
    contexts.sort_by(|a, b| {
        let score_a = a.get("relevance_score").and_then(Value::as_f64).unwrap_or(0.0);
        let score_b = b.get("relevance_score").and_then(Value::as_f64).unwrap_or(0.0);
        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
    });
    contexts
}

#[async_trait]
impl Tool for RetrieveContextTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("query".to_string(), ToolParameter::new("string", "Search query for semantic matching against stored contexts"));
        properties.insert(
            "limit".to_string(),
            ToolParameter::new("integer", "Maximum results to return")
                .with_default(Value::from(self.config.default_limit))
                .with_bounds(Some(1.0), Some(self.config.max_results as f64)),
        );
        properties.insert("type".to_string(), ToolParameter::new("string", "Filter by context type"));
        properties.insert(
            "metadata_filters".to_string(),
            ToolParameter::new("object", "Exact-match metadata filters"),
        );
        build_descriptor(
            "retrieve_context",
            "Retrieve stored context matching a query",
            properties,
            vec!["query".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or("");
        if query.trim().is_empty() {
            return Err(ToolError::new("Query cannot be empty", "empty_query"));
        }
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.default_limit as u64)
            .min(self.config.max_results as u64) as u32;
        let context_type = arguments.get("type").and_then(Value::as_str);
        let metadata_filters = arguments.get("metadata_filters").cloned();

        let cache_key_args = serde_json::json!({
            "query": query, "limit": limit, "type": context_type, "metadata_filters": metadata_filters,
        });
        let cache_key = Cache::key("retrieve_context", &cache_key_args);

        if let Some(cached) = self.cache.write().await.get(&cache_key) {
            debug!(query, "retrieve_context cache hit");
            return Ok(ToolResult::success("Retrieved context (cached)", Some(cached), None));
        }

        let response = self
            .client
            .retrieve_context(query, limit, context_type, metadata_filters)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let formatted = format_contexts(results);
        let count = formatted.len();

        let text = if count == 0 {
            format!("No contexts found matching query: '{query}'")
        } else {
            let mut summary = format!("Found {count} context(s) matching '{query}':");
            for (i, context) in formatted.iter().take(3).enumerate() {
                let title = context.get("title").and_then(Value::as_str).unwrap_or("");
                summary.push_str(&format!("\n{}. {title}", i + 1));
            }
            if count > 3 {
                summary.push_str(&format!("\n... and {} more results", count - 3));
            }
            summary
        };

        let data = serde_json::json!({
            "query": query,
            "results": formatted,
            "count": count,
        });

        self.cache.write().await.put(cache_key, data.clone());

        Ok(ToolResult::success(text, Some(data), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_content_field_over_fallback() {
        let context = serde_json::json!({"id": "abcdefgh12", "content": {"title": "Weekly sync"}});
        assert_eq!(extract_title(&context), "Weekly sync");
    }

    #[test]
    fn title_falls_back_to_type_and_short_id() {
        let context = serde_json::json!({"id": "abcdefgh12", "content": {"type": "decision"}});
        assert_eq!(extract_title(&context), "decision (abcdefgh)");
    }

    #[test]
    fn summary_prefers_first_sentence() {
        let context = serde_json::json!({"content": {"summary": "Short note. Rest is ignored."}});
        assert_eq!(extract_summary(&context), "Short note.");
    }

    #[test]
    fn format_contexts_sorts_by_relevance_descending() {
        let contexts = vec![
            serde_json::json!({"id": "a", "relevance_score": 0.2, "content": {}}),
            serde_json::json!({"id": "b", "relevance_score": 0.9, "content": {}}),
        ];
        let formatted = format_contexts(contexts);
        assert_eq!(formatted[0]["id"], "b");
        assert_eq!(formatted[1]["id"], "a");
    }
}
