/// JSON-RPC 2.0 wire types and MCP protocol shapes.
///
/// Grounded on `protocol/schemas.py` and the teacher's `core/server.rs`
/// request/response structs, generalized to the full MCP method set and the
/// "result XOR error" invariant spec.md §3/§8 requires.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// JSON-RPC 2.0 standard error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const NOT_INITIALIZED: i32 = -32002;
pub const GENERIC_ERROR: i32 = -32000;

/// A decoded line from the transport: either a request (has `id`) or a
/// notification (no `id`).
#[derive(Debug, Deserialize, Clone)]
pub struct RpcRequest {
    #[serde(default)]
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

impl RpcRequest {
    /// A Request has an `id`; a Notification does not.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcNotification {
    pub fn log(level: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "notifications/log".to_string(),
            params: Some(serde_json::json!({
                "level": level,
                "message": message.into(),
                "data": data,
            })),
        }
    }

    pub fn progress(progress_token: &Value, progress: f64, total: Option<f64>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: "notifications/progress".to_string(),
            params: Some(serde_json::json!({
                "progressToken": progress_token,
                "progress": progress,
                "total": total,
            })),
        }
    }
}

/// A single JSON-Schema-shaped parameter definition.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl ToolParameter {
    pub fn new(param_type: &str, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.to_string(),
            description: description.into(),
            r#enum: None,
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.r#enum = Some(values);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_bounds(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, ToolParameter>,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

/// `(name, description, input_schema)` — a tool's discoverable descriptor.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: ToolSchema,
}

/// One content part of a tool result. MCP hosts display text parts only;
/// structured data is folded into the text as a fenced JSON block.
#[derive(Debug, Serialize, Clone)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ToolResult {
    pub content: Vec<ContentPart>,
    #[serde(rename = "isError")]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn success(text: impl Into<String>, data: Option<Value>, metadata: Option<Value>) -> Self {
        let mut text = text.into();
        if let Some(data) = &data {
            text.push_str(&format!(
                "\n\nStructured Data:\n```json\n{}\n```",
                serde_json::to_string_pretty(data).unwrap_or_default()
            ));
        }
        Self {
            content: vec![ContentPart {
                content_type: "text".to_string(),
                text,
            }],
            is_error: false,
            metadata,
        }
    }

    pub fn error(message: impl Into<String>, error_code: &str, details: Option<Value>) -> Self {
        let mut text = format!("Error: {}", message.into());
        if let Some(details) = &details {
            let payload = serde_json::json!({ "error_code": error_code, "details": details });
            text.push_str(&format!(
                "\n\nError Details:\n```json\n{}\n```",
                serde_json::to_string_pretty(&payload).unwrap_or_default()
            ));
        }
        Self {
            content: vec![ContentPart {
                content_type: "text".to_string(),
                text,
            }],
            is_error: true,
            metadata: None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_omits_absent_field() {
        let ok = RpcResponse::success(Some(Value::from(1)), serde_json::json!({"a": 1}));
        let v = serde_json::to_value(&ok).unwrap();
        assert!(v.get("error").is_none());
        assert!(v.get("result").is_some());

        let err = RpcResponse::failure(Some(Value::from(1)), METHOD_NOT_FOUND, "nope", None);
        let v = serde_json::to_value(&err).unwrap();
        assert!(v.get("result").is_none());
        assert!(v.get("error").is_some());
    }

    #[test]
    fn tool_result_success_embeds_json_block() {
        let result = ToolResult::success("done", Some(serde_json::json!({"count": 3})), None);
        assert!(!result.is_error);
        assert!(result.content[0].text.contains("```json"));
    }
}
