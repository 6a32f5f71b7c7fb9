/// `webhook_management` and `event_notification` tools: subscription CRUD
/// and manual event publication over the webhook fabric.
///
/// Grounded on `tools/webhook_tools.py`.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::protocol::schemas::{ToolDescriptor, ToolParameter, ToolResult};
use crate::tools::base::{build_descriptor, Tool};
use crate::webhooks::events::{create_system_event, Event, EventType};
use crate::webhooks::manager::WebhookManager;

pub struct WebhookManagementTool {
    manager: Arc<WebhookManager>,
    config: ToolConfig,
}

impl WebhookManagementTool {
    pub fn new(manager: Arc<WebhookManager>, config: ToolConfig) -> Self {
        Self { manager, config }
    }
}

#[async_trait]
impl Tool for WebhookManagementTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert(
            "action".to_string(),
            ToolParameter::new("string", "Management action")
                .with_enum(vec!["subscribe".to_string(), "unsubscribe".to_string(), "list".to_string()]),
        );
        properties.insert("url".to_string(), ToolParameter::new("string", "Webhook delivery URL (subscribe)"));
        properties.insert("event_types".to_string(), ToolParameter::new("array", "Event types to subscribe to, or ['*'] for all (subscribe)"));
        properties.insert("signing_secret".to_string(), ToolParameter::new("string", "Secret used to HMAC-sign delivered payloads (subscribe)"));
        properties.insert("headers".to_string(), ToolParameter::new("object", "Extra headers sent with every delivery to this subscription (subscribe)"));
        properties.insert("subscription_id".to_string(), ToolParameter::new("string", "Subscription to remove (unsubscribe)"));
        build_descriptor(
            "webhook_management",
            "Manage webhook subscriptions",
            properties,
            vec!["action".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("webhook_management is disabled", "tool_disabled"));
        }
        let action = arguments
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: action"))?;

        match action {
            "subscribe" => {
                let url = arguments
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::validation("Missing required parameter: url"))?
                    .to_string();
                let event_types = arguments
                    .get("event_types")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_else(|| vec!["*".to_string()]);
                let signing_secret = arguments.get("signing_secret").and_then(Value::as_str).map(str::to_string);
                let headers = arguments
                    .get("headers")
                    .and_then(Value::as_object)
                    .map(|map| {
                        map.iter()
                            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                            .collect()
                    })
                    .unwrap_or_default();

                let subscription = self.manager.subscribe(url, event_types, headers, signing_secret).await;
                Ok(ToolResult::success(
                    format!("Subscribed {}", subscription.id),
                    Some(serde_json::to_value(&subscription).unwrap_or_default()),
                    None,
                ))
            }
            "unsubscribe" => {
                let subscription_id = arguments
                    .get("subscription_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::validation("Missing required parameter: subscription_id"))?;
                let removed = self.manager.unsubscribe(subscription_id).await;
                Ok(ToolResult::success(
                    if removed { "Unsubscribed" } else { "No such subscription" },
                    Some(serde_json::json!({ "removed": removed })),
                    None,
                ))
            }
            "list" => {
                let subscriptions = self.manager.list_subscriptions().await;
                Ok(ToolResult::success(
                    format!("{} subscription(s)", subscriptions.len()),
                    Some(serde_json::to_value(&subscriptions).unwrap_or_default()),
                    None,
                ))
            }
            other => Err(ToolError::validation(format!("Unknown action: {other}"))),
        }
    }
}

pub struct EventNotificationTool {
    manager: Arc<WebhookManager>,
    config: ToolConfig,
}

impl EventNotificationTool {
    pub fn new(manager: Arc<WebhookManager>, config: ToolConfig) -> Self {
        Self { manager, config }
    }
}

#[async_trait]
impl Tool for EventNotificationTool {
    fn descriptor(&self) -> ToolDescriptor {
        let mut properties = HashMap::new();
        properties.insert("event_type".to_string(), ToolParameter::new("string", "Event type name, e.g. 'context.stored'"));
        properties.insert("data".to_string(), ToolParameter::new("object", "Event payload data"));
        build_descriptor(
            "event_notification",
            "Publish a custom event to subscribed webhooks",
            properties,
            vec!["event_type".to_string()],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.config.enabled {
            return Err(ToolError::new("event_notification is disabled", "tool_disabled"));
        }
        let event_type_name = arguments
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation("Missing required parameter: event_type"))?;
        let data = arguments.get("data").cloned().unwrap_or_else(|| serde_json::json!({}));

        let event_type = parse_event_type(event_type_name)
            .ok_or_else(|| ToolError::validation(format!("Unknown event_type: {event_type_name}")))?;
        let event: Event = create_system_event(event_type, data, "event_notification");
        let event_id = event.id.clone();
        self.manager.publish(event);

        Ok(ToolResult::success(format!("Published event {event_id}"), None, None))
    }
}

fn parse_event_type(name: &str) -> Option<EventType> {
    let candidates = [
        EventType::ContextStored,
        EventType::ContextRetrieved,
        EventType::ContextDeleted,
        EventType::ContextForgotten,
        EventType::BatchOperationStarted,
        EventType::BatchOperationCompleted,
        EventType::BatchOperationFailed,
        EventType::StreamStarted,
        EventType::StreamCompleted,
        EventType::StreamFailed,
        EventType::ServerStarted,
        EventType::ServerStopped,
        EventType::HealthCheckFailed,
        EventType::CacheEviction,
        EventType::AuthFailed,
        EventType::RateLimitExceeded,
        EventType::SecuritySuspiciousActivity,
    ];
    candidates.into_iter().find(|candidate| candidate.as_str() == name)
}
