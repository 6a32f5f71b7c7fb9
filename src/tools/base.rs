/// Shared tool abstraction: trait, argument validation, schema helpers.
///
/// Grounded on `tools/base.py::BaseTool`/`ToolResult`/validation logic,
/// reshaped as a Rust trait object dispatched from the protocol engine's
/// `ToolRegistry` instead of a Python ABC with runtime reflection.
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult, ToolSchema};

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError>;

    /// Validate then execute, always returning a wire-ready `ToolResult`.
    /// Tool errors never escape as protocol errors (spec.md §7).
    async fn call(&self, arguments: Value) -> ToolResult {
        let descriptor = self.descriptor();
        if let Err(err) = validate_arguments(&descriptor, &arguments) {
            return ToolResult::error(err.message, &err.code, non_null(err.details));
        }

        match self.execute(arguments).await {
            Ok(result) => result,
            Err(err) => ToolResult::error(err.message, &err.code, non_null(err.details)),
        }
    }
}

fn non_null(value: Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// Enforce required properties, per-property JSON types, and enum
/// membership against `descriptor.input_schema`.
pub fn validate_arguments(descriptor: &ToolDescriptor, arguments: &Value) -> Result<(), ToolError> {
    let Some(object) = arguments.as_object() else {
        return Err(ToolError::validation("arguments must be a JSON object"));
    };

    for required in &descriptor.input_schema.required {
        if !object.contains_key(required) {
            return Err(ToolError::validation(format!(
                "Missing required parameter: {required}"
            ))
            .with_details(serde_json::json!({ "missing_parameter": required })));
        }
    }

    for (name, value) in object {
        if let Some(definition) = descriptor.input_schema.properties.get(name) {
            validate_parameter(name, value, definition)?;
        }
    }

    Ok(())
}

fn validate_parameter(name: &str, value: &Value, definition: &ToolParameter) -> Result<(), ToolError> {
    let type_ok = match definition.param_type.as_str() {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    };

    if !type_ok {
        return Err(ToolError::validation(format!(
            "Parameter '{name}' must be a {}",
            definition.param_type
        ))
        .with_details(serde_json::json!({
            "parameter": name,
            "expected_type": definition.param_type,
        })));
    }

    if let Some(allowed) = &definition.r#enum {
        let matches = value
            .as_str()
            .map(|s| allowed.iter().any(|a| a == s))
            .unwrap_or(false);
        if !matches {
            return Err(ToolError::validation(format!(
                "Parameter '{name}' must be one of: {allowed:?}"
            ))
            .with_details(serde_json::json!({
                "parameter": name,
                "allowed_values": allowed,
                "actual_value": value,
            })));
        }
    }

    Ok(())
}

/// Build a `ToolDescriptor` from a parameter map, mirroring
/// `BaseTool::_create_schema`/`_create_parameter`.
pub fn build_descriptor(
    name: &str,
    description: &str,
    properties: HashMap<String, ToolParameter>,
    required: Vec<String>,
) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: ToolSchema {
            schema_type: "object".to_string(),
            properties,
            required,
            additional_properties: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_descriptor() -> ToolDescriptor {
        let mut props = HashMap::new();
        props.insert(
            "limit".to_string(),
            ToolParameter::new("integer", "result limit"),
        );
        props.insert(
            "query".to_string(),
            ToolParameter::new("string", "search query"),
        );
        build_descriptor("sample", "a sample tool", props, vec!["query".to_string()])
    }

    #[test]
    fn rejects_missing_required() {
        let descriptor = sample_descriptor();
        let err = validate_arguments(&descriptor, &serde_json::json!({})).unwrap_err();
        assert_eq!(err.code, "validation_error");
    }

    #[test]
    fn rejects_wrong_type() {
        let descriptor = sample_descriptor();
        let err = validate_arguments(
            &descriptor,
            &serde_json::json!({"query": "x", "limit": "not a number"}),
        )
        .unwrap_err();
        assert_eq!(err.code, "validation_error");
    }

    #[test]
    fn accepts_valid_arguments() {
        let descriptor = sample_descriptor();
        assert!(validate_arguments(&descriptor, &serde_json::json!({"query": "x", "limit": 5})).is_ok());
    }
}
