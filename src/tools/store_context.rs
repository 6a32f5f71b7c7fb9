/// `store_context` tool: persist content into the backend under a mapped
/// context type.
///
/// Grounded on `tools/store_context.py`. Always sends the mapped type
/// rather than the hardcoded `"log"` the Python source sent regardless of
/// input (spec.md §9 source bug #2) and invalidates the read cache on
/// every successful store. An optional `title` is merged into the content
/// object, and a missing `text` field is synthesized by joining whichever
/// common string fields are present.
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

pub struct StoreContextTool {
    client: Arc<VerisClient>,
    cache: Arc<RwLock<Cache>>,
    config: ToolConfig,
}

impl StoreContextTool {
    pub fn new(client: Arc<VerisClient>, cache: Arc<RwLock<Cache>>, config: ToolConfig) -> Self {
        Self { client, cache, config }
    }
}

/// Fields tried in order when `text` is absent from `content`.
const TEXT_FIELDS: &[&str] = &["text", "description", "summary", "content", "message", "notes"];

/// Best-effort text synthesis so the backend's required `text` field is
/// always present, mirroring the source's field-priority fallback chain.
fn extract_text_content(content: &serde_json::Map<String, Value>) -> String {
    for field in TEXT_FIELDS {
        if let Some(s) = content.get(*field).and_then(Value::as_str) {
            if !s.trim().is_empty() {
                return s.trim().to_string();
            }
        }
    }

    let mut parts = Vec::new();
    if let Some(title) = content.get("title").and_then(Value::as_str) {
        parts.push(title.to_string());
    }
    for (key, value) in content {
        if key == "title" {
            continue;
        }
        if let Some(s) = value.as_str() {
            if !s.trim().is_empty() {
                parts.push(format!("{key}: {s}"));
            }
        }
    }

    if parts.is_empty() {
        Value::Object(content.clone()).to_string()
    } else {
        parts.join(" | ")
    }
}

#[async_trait]
impl Tool for StoreContextTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert(
            "content".to_string(),
            ToolParameter::new("object", "Content to store as context"),
        );
        properties.insert(
            "context_type".to_string(),
            ToolParameter::new("string", "Context type; non-standard values are mapped to the closest supported type"),
        );
        properties.insert(
            "metadata".to_string(),
            ToolParameter::new("object", "Optional metadata to attach to the stored context"),
        );
        build_descriptor(
            "store_context",
            "Store content as context in the memory backend",
            properties,
            vec!["context_type".to_string(), "content".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("store_context is disabled", "tool_disabled"));
        }

        let content = arguments.get("content").cloned().unwrap_or(Value::Null);
        let context_type = arguments
            .get("context_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: context_type"))?;
        let metadata = arguments.get("metadata").cloned().unwrap_or_else(|| serde_json::json!({}));
        let title = arguments.get("title").and_then(Value::as_str);

        let serialized_size = serde_json::to_string(&content).map(|s| s.len()).unwrap_or(0);
        if serialized_size > self.config.max_content_size {
            return Err(ToolError::validation(format!(
                "content exceeds max_content_size of {} bytes",
                self.config.max_content_size
            )));
        }

        let mut content = match content {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("text".to_string(), Value::String(other.to_string()));
                map
            }
        };
        if let Some(title) = title {
            content.insert("title".to_string(), Value::String(title.to_string()));
        }
        if !content.contains_key("text") {
            let text = extract_text_content(&content);
            content.insert("text".to_string(), Value::String(text));
        }
        let content = Value::Object(content);

        let response = self
            .client
            .store_context(context_type, content, metadata)
            .await
            .map_err(|err| ToolError::from_client_error(&err))?;

        self.cache.write().await.invalidate_all();

        let context_id = response.get("context_id").and_then(Value::as_str);
        let mut success_message = format!("Successfully stored {context_type} context");
        if let Some(context_id) = context_id {
            success_message.push_str(&format!(" with ID: {context_id}"));
        }
        Ok(ToolResult::success(success_message, Some(response), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, &str)]) -> serde_json::Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::String(v.to_string()))).collect()
    }

    #[test]
    fn prefers_known_text_fields_over_joining() {
        let content = obj(&[("summary", "a concise summary"), ("notes", "ignored")]);
        assert_eq!(extract_text_content(&content), "a concise summary");
    }

    #[test]
    fn falls_back_to_joining_title_and_other_strings() {
        let content = obj(&[("title", "Weekly sync"), ("owner", "alice")]);
        let text = extract_text_content(&content);
        assert_eq!(text, "Weekly sync | owner: alice");
    }

    #[test]
    fn falls_back_to_stringified_content_when_nothing_textual() {
        let content = obj(&[]);
        assert_eq!(extract_text_content(&content), "{}");
    }
}
