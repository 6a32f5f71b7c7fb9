/// Webhook event types and payload signing.
///
/// Grounded on `webhooks/events.py`: `EventType`, the `Event` payload shape,
/// and `to_webhook_payload`'s canonical-JSON HMAC-SHA256 signing (sort
/// keys, compact separators, sign, then append the `signature` field).
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ContextStored,
    ContextRetrieved,
    ContextDeleted,
    ContextForgotten,
    BatchOperationStarted,
    BatchOperationCompleted,
    BatchOperationFailed,
    StreamStarted,
    StreamCompleted,
    StreamFailed,
    ServerStarted,
    ServerStopped,
    HealthCheckFailed,
    CacheEviction,
    AuthFailed,
    RateLimitExceeded,
    SecuritySuspiciousActivity,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ContextStored => "context.stored",
            EventType::ContextRetrieved => "context.retrieved",
            EventType::ContextDeleted => "context.deleted",
            EventType::ContextForgotten => "context.forgotten",
            EventType::BatchOperationStarted => "batch.operation.started",
            EventType::BatchOperationCompleted => "batch.operation.completed",
            EventType::BatchOperationFailed => "batch.operation.failed",
            EventType::StreamStarted => "stream.started",
            EventType::StreamCompleted => "stream.completed",
            EventType::StreamFailed => "stream.failed",
            EventType::ServerStarted => "server.started",
            EventType::ServerStopped => "server.stopped",
            EventType::HealthCheckFailed => "health.check.failed",
            EventType::CacheEviction => "cache.eviction",
            EventType::AuthFailed => "auth.failed",
            EventType::RateLimitExceeded => "rate_limit.exceeded",
            EventType::SecuritySuspiciousActivity => "security.suspicious_activity",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
    pub source: String,
}

impl Event {
    pub fn new(event_type: EventType, data: Value, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            data,
            source: source.into(),
        }
    }

    pub fn to_dict(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": self.event_type.as_str(),
            "timestamp": self.timestamp.to_rfc3339(),
            "data": self.data,
            "source": self.source,
        })
    }

    /// Canonical (sorted-key, compact-separator) JSON is signed, then the
    /// `signature` field is appended to the payload after computation.
    pub fn to_webhook_payload(&self, signing_secret: Option<&str>) -> Value {
        let mut payload = self.to_dict();

        let Some(secret) = signing_secret else {
            return payload;
        };

        let canonical = canonical_json(&payload);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(canonical.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        if let Value::Object(map) = &mut payload {
            map.insert("signature".to_string(), Value::String(format!("sha256={signature}")));
        }
        payload
    }
}

fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sort_keys(value)).unwrap_or_default()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), sort_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

pub fn create_context_event(event_type: EventType, context_id: &str, context_type: &str, source: &str) -> Event {
    Event::new(
        event_type,
        serde_json::json!({ "context_id": context_id, "context_type": context_type }),
        source,
    )
}

pub fn create_batch_event(event_type: EventType, batch_id: &str, item_count: usize, source: &str) -> Event {
    Event::new(
        event_type,
        serde_json::json!({ "batch_id": batch_id, "item_count": item_count }),
        source,
    )
}

pub fn create_stream_event(event_type: EventType, stream_id: &str, source: &str) -> Event {
    Event::new(event_type, serde_json::json!({ "stream_id": stream_id }), source)
}

pub fn create_system_event(event_type: EventType, detail: Value, source: &str) -> Event {
    Event::new(event_type, detail, source)
}

pub fn create_security_event(event_type: EventType, detail: Value, source: &str) -> Event {
    Event::new(event_type, detail, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_appended_after_computation() {
        let event = create_context_event(EventType::ContextStored, "ctx-1", "design", "server");
        let payload = event.to_webhook_payload(Some("secret"));
        let signature = payload.get("signature").and_then(Value::as_str).unwrap();
        assert!(signature.starts_with("sha256="));
    }

    #[test]
    fn no_secret_means_no_signature() {
        let event = create_context_event(EventType::ContextStored, "ctx-1", "design", "server");
        let payload = event.to_webhook_payload(None);
        assert!(payload.get("signature").is_none());
    }

    #[test]
    fn signature_is_deterministic_for_same_payload_shape() {
        let event = create_stream_event(EventType::StreamStarted, "s-1", "server");
        let a = event.to_webhook_payload(Some("k"));
        let b = event.to_webhook_payload(Some("k"));
        assert_eq!(a.get("signature"), b.get("signature"));
    }
}
