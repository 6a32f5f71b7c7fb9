/// `analytics` and `metrics` tools: read-side views over backend usage and
/// server-local operational metrics.
///
/// Grounded on `tools/analytics_tools.py` and `analytics/collector.py`.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{AnalyticsView, VerisClient};
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::metrics::MetricsCollector;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::tools::base::{build_descriptor, Tool};

pub struct AnalyticsTool {
    client: Arc<VerisClient>,
    config: ToolConfig,
}

impl AnalyticsTool {
    pub fn new(client: Arc<VerisClient>, config: ToolConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Tool for AnalyticsTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert(
            "minutes".to_string(),
            ToolParameter::new("integer", "Lookback window in minutes").with_default(Value::from(60)).with_bounds(Some(1.0), Some(1440.0)),
        );
        properties.insert(
            "include_insights".to_string(),
            ToolParameter::new("boolean", "Include derived performance insights").with_default(Value::Bool(false)),
        );
        properties.insert(
            "view".to_string(),
            ToolParameter::new("string", "Which shaped view to return")
                .with_enum(vec![
                    "usage_stats".to_string(),
                    "performance_insights".to_string(),
                    "real_time_metrics".to_string(),
                    "summary".to_string(),
                ])
                .with_default(Value::String("summary".to_string())),
        );
        build_descriptor(
            "analytics",
            "Fetch backend usage analytics",
            properties,
            Vec::new(),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("analytics is disabled", "tool_disabled"));
        }
        let minutes = arguments.get("minutes").and_then(Value::as_u64).unwrap_or(60) as u32;
        let include_insights = arguments.get("include_insights").and_then(Value::as_bool).unwrap_or(false);
        let view = match arguments.get("view").and_then(Value::as_str).unwrap_or("summary") {
            "usage_stats" => AnalyticsView::UsageStats,
            "performance_insights" => AnalyticsView::PerformanceInsights,
            "real_time_metrics" => AnalyticsView::RealTimeMetrics,
            _ => AnalyticsView::Summary,
        };

        let response = self.client.analytics(minutes, include_insights, view).await;
        Ok(ToolResult::success("Analytics", Some(response), None))
    }
}

pub struct MetricsTool {
    collector: Arc<MetricsCollector>,
    config: ToolConfig,
}

impl MetricsTool {
    pub fn new(collector: Arc<MetricsCollector>, config: ToolConfig) -> Self {
        Self { collector, config }
    }
}

#[async_trait]
impl Tool for MetricsTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("operation".to_string(), ToolParameter::new("string", "Restrict to metric series whose name starts with this prefix"));
        build_descriptor(
            "metrics",
            "Fetch aggregated server-local operational metrics",
            properties,
            Vec::new(),
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("metrics is disabled", "tool_disabled"));
        }
        let operation = arguments.get("operation").and_then(Value::as_str);

        let aggregated = self.collector.get_aggregated_metrics().await;
        let filtered: HashMap<&String, &_> = match operation {
            Some(prefix) => aggregated.iter().filter(|(key, _)| key.starts_with(prefix)).collect(),
            None => aggregated.iter().collect(),
        };
        let stats = self.collector.get_stats().await;

        Ok(ToolResult::success(
            "Metrics",
            Some(serde_json::json!({
                "metrics": serde_json::to_value(&filtered).unwrap_or_default(),
                "stats": stats,
            })),
            None,
        ))
    }
}
