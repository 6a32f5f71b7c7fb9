/// `health_check` tool: run the registered health checks and return the
/// aggregate status alongside each check's detail.
///
/// Grounded on `utils/health.py`'s checker, exposed here as an MCP tool
/// since the host has no separate out-of-band health endpoint over stdio.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::health::HealthChecker;
use crate::protocol::schemas::{ToolDescriptor, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

pub struct HealthCheckTool {
    checker: Arc<HealthChecker>,
    config: ToolConfig,
}

impl HealthCheckTool {
    pub fn new(checker: Arc<HealthChecker>, config: ToolConfig) -> Self {
        Self { checker, config }
    }
}

#[async_trait]
impl Tool for HealthCheckTool {
    fn descriptor(&self) -> ToolDescriptor {
        build_descriptor(
            "health_check",
            "Run registered health checks and return the aggregate server status",
            HashMap::new(),
            Vec::new(),
        )
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("health_check is disabled", "tool_disabled"));
        }
        let (status, results) = self.checker.run_all_checks().await;
        Ok(ToolResult::success(
            format!("Overall status: {status:?}"),
            Some(serde_json::json!({ "status": status, "checks": results })),
            None,
        ))
    }
}
