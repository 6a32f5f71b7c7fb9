/// Protocol engine: lifecycle state, method dispatch, tool registry.
///
/// Grounded on `protocol/handlers.py::MCPHandler` (method dispatch, lifecycle
/// gating) and the teacher's `ToolRegistry`/`handle_*` functions in
/// `core/server.rs`, generalized to async tool execution (spec.md §4.C).
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::schemas::{
    RpcRequest, RpcResponse, ToolDescriptor, INVALID_PARAMS, METHOD_NOT_FOUND, NOT_INITIALIZED,
};
use crate::tools::base::Tool;

/// Known MCP protocol versions this server has been exercised against.
/// Unknown versions are accepted with a warning (spec.md §4.C: "be liberal
/// on input").
const KNOWN_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05"];

pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let descriptor = tool.descriptor();
        self.tools.insert(descriptor.name.clone(), tool);
        self.descriptors.push(descriptor);
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `NEW ──initialize──▶ READY ──tools/list, tools/call──▶ READY`; `CLOSED` is
/// driven by the transport observing EOF, not by the engine itself.
pub struct ProtocolEngine {
    registry: Arc<ToolRegistry>,
    initialized: AtomicBool,
    server_name: String,
    server_version: String,
}

impl ProtocolEngine {
    pub fn new(registry: Arc<ToolRegistry>, server_name: String, server_version: String) -> Self {
        Self {
            registry,
            initialized: AtomicBool::new(false),
            server_name,
            server_version,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => {
                warn!(method = other, "unknown method");
                RpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                    None,
                )
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> RpcResponse {
        if let Some(version) = params
            .as_ref()
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
        {
            if !KNOWN_PROTOCOL_VERSIONS.contains(&version) {
                warn!(client_protocol_version = version, "unrecognized protocol version, accepting anyway");
            }
        }

        self.initialized.store(true, Ordering::SeqCst);

        RpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {},
                    "resources": {},
                    "prompts": {},
                },
                "serverInfo": {
                    "name": self.server_name,
                    "version": self.server_version,
                },
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> RpcResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return not_initialized(id);
        }

        RpcResponse::success(
            id,
            serde_json::json!({ "tools": self.registry.descriptors() }),
        )
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> RpcResponse {
        if !self.initialized.load(Ordering::SeqCst) {
            return not_initialized(id);
        }

        let Some(params) = params else {
            return RpcResponse::failure(id, INVALID_PARAMS, "Invalid params", None);
        };

        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return RpcResponse::failure(id, INVALID_PARAMS, "Missing tool name", None);
        };

        let arguments = params.get("arguments").cloned().unwrap_or_else(|| serde_json::json!({}));

        let Some(tool) = self.registry.get(name) else {
            return RpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Unknown tool: {name}"),
                None,
            );
        };

        let result = tool.call(arguments).await;
        RpcResponse::success(id, result.to_value())
    }
}

fn not_initialized(id: Option<Value>) -> RpcResponse {
    RpcResponse::failure(
        id,
        NOT_INITIALIZED,
        "Server not initialized; call 'initialize' first",
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::schemas::NOT_INITIALIZED as NI;

    #[tokio::test]
    async fn rejects_tools_before_initialize() {
        let engine = ProtocolEngine::new(
            Arc::new(ToolRegistry::new()),
            "test".to_string(),
            "0.0.0".to_string(),
        );
        let request = RpcRequest {
            jsonrpc: Some("2.0".to_string()),
            id: Some(Value::String("a".to_string())),
            method: "tools/list".to_string(),
            params: None,
        };
        let response = engine.handle(request).await;
        assert_eq!(response.error.unwrap().code, NI);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let engine = ProtocolEngine::new(
            Arc::new(ToolRegistry::new()),
            "test".to_string(),
            "0.0.0".to_string(),
        );
        let init = RpcRequest {
            jsonrpc: Some("2.0".to_string()),
            id: Some(Value::from(1)),
            method: "initialize".to_string(),
            params: None,
        };
        engine.handle(init).await;

        let request = RpcRequest {
            jsonrpc: Some("2.0".to_string()),
            id: Some(Value::from(7)),
            method: "foo".to_string(),
            params: None,
        };
        let response = engine.handle(request).await;
        let err = response.error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert!(err.message.contains("foo"));
    }
}
