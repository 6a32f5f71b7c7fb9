/// Webhook delivery with classified retry/backoff.
///
/// Grounded on `webhooks/delivery.py::WebhookDelivery`: the attempt loop,
/// `backoff_delay = min(initial * mult^(attempt-1), cap)`, HTTP status
/// classification (2xx success/stop, 4xx abandoned/no-retry, 5xx-or-timeout
/// retry), and the delivery history/stats bookkeeping.
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::events::Event;

const INITIAL_BACKOFF_SECS: f64 = 1.0;
const BACKOFF_MULTIPLIER: f64 = 2.0;
const BACKOFF_CAP_SECS: f64 = 60.0;
const MAX_RETRIES: u32 = 3;
const MAX_HISTORY: usize = 1_000;
const RESPONSE_BODY_TRUNCATE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    Retrying,
    Abandoned,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub attempt: u32,
    pub status_code: Option<u16>,
    pub response_time_ms: f64,
    pub error: Option<String>,
    pub response_body_truncated: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub subscription_id: String,
    pub event_id: String,
    pub status: DeliveryStatus,
    pub attempts: Vec<DeliveryAttempt>,
    pub completed_at: DateTime<Utc>,
}

enum Classification {
    Success,
    Retry,
    Abandon,
}

fn classify(status: Option<u16>) -> Classification {
    match status {
        Some(code) if (200..300).contains(&code) => Classification::Success,
        Some(code) if (400..500).contains(&code) => Classification::Abandon,
        _ => Classification::Retry,
    }
}

pub struct WebhookDelivery {
    http: Client,
    history: Mutex<VecDeque<DeliveryResult>>,
}

impl WebhookDelivery {
    pub fn new(http: Client) -> Arc<Self> {
        Arc::new(Self {
            http,
            history: Mutex::new(VecDeque::new()),
        })
    }

    pub async fn deliver_event(
        &self,
        subscription_id: &str,
        url: &str,
        event: &Event,
        extra_headers: &HashMap<String, String>,
        signing_secret: Option<&str>,
    ) -> DeliveryResult {
        let payload = event.to_webhook_payload(signing_secret);
        let delivery_id = Uuid::new_v4().to_string();
        let headers = self.prepare_headers(&delivery_id, extra_headers);
        let mut attempts = Vec::new();
        let mut attempt_number = 0u32;

        let status = loop {
            attempt_number += 1;
            let attempted_at = Utc::now();
            let started = Instant::now();

            let outcome = self.http.post(url).headers(headers.clone()).json(&payload).send().await;
            let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

            let (status_code, error, response_body_truncated) = match outcome {
                Ok(response) => {
                    let status_code = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    let truncated: String = body.chars().take(RESPONSE_BODY_TRUNCATE).collect();
                    (Some(status_code), None, Some(truncated))
                }
                Err(err) => (None, Some(err.to_string()), None),
            };

            attempts.push(DeliveryAttempt {
                attempt: attempt_number,
                status_code,
                response_time_ms,
                error: error.clone(),
                response_body_truncated,
                attempted_at,
            });

            match classify(status_code) {
                Classification::Success => break DeliveryStatus::Success,
                Classification::Abandon => {
                    warn!(subscription_id, status_code, "webhook delivery abandoned on client error");
                    break DeliveryStatus::Abandoned;
                }
                Classification::Retry => {
                    if attempt_number > MAX_RETRIES {
                        warn!(subscription_id, attempt_number, "webhook delivery failed after exhausting retries");
                        break DeliveryStatus::Failed;
                    }
                    let delay = backoff_delay(attempt_number);
                    debug!(subscription_id, attempt_number, delay_ms = delay.as_millis() as u64, "retrying webhook delivery");
                    tokio::time::sleep(delay).await;
                }
            }
        };

        let result = DeliveryResult {
            subscription_id: subscription_id.to_string(),
            event_id: event.id.clone(),
            status,
            attempts,
            completed_at: Utc::now(),
        };

        self.add_to_history(result.clone()).await;
        result
    }

    fn prepare_headers(&self, delivery_id: &str, extra_headers: &HashMap<String, String>) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert("User-Agent", "Veris-Memory-MCP-Server/1.0".parse().unwrap());
        if let Ok(value) = delivery_id.parse() {
            headers.insert("X-Webhook-Delivery", value);
        }
        for (key, value) in extra_headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                value.parse(),
            ) {
                headers.insert(name, value);
            }
        }
        headers
    }

    async fn add_to_history(&self, result: DeliveryResult) {
        let mut history = self.history.lock().await;
        if history.len() >= MAX_HISTORY {
            history.pop_front();
        }
        history.push_back(result);
    }

    pub async fn get_recent_deliveries(&self, limit: usize) -> Vec<DeliveryResult> {
        let history = self.history.lock().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    pub async fn get_delivery_stats(&self) -> serde_json::Value {
        let history = self.history.lock().await;
        let total = history.len();
        let success = history.iter().filter(|r| r.status == DeliveryStatus::Success).count();
        let abandoned = history.iter().filter(|r| r.status == DeliveryStatus::Abandoned).count();
        let failed = history.iter().filter(|r| r.status == DeliveryStatus::Failed).count();
        serde_json::json!({
            "total_deliveries": total,
            "successful": success,
            "abandoned": abandoned,
            "failed": failed,
        })
    }
}

/// `delay = min(initial * mult^(attempt-1), cap)`.
fn backoff_delay(attempt: u32) -> Duration {
    let raw = INITIAL_BACKOFF_SECS * BACKOFF_MULTIPLIER.powi(attempt as i32 - 1);
    Duration::from_secs_f64(raw.min(BACKOFF_CAP_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_2xx_as_success() {
        assert!(matches!(classify(Some(204)), Classification::Success));
    }

    #[test]
    fn classifies_4xx_as_abandon() {
        assert!(matches!(classify(Some(404)), Classification::Abandon));
    }

    #[test]
    fn classifies_5xx_and_network_errors_as_retry() {
        assert!(matches!(classify(Some(503)), Classification::Retry));
        assert!(matches!(classify(None), Classification::Retry));
    }

    #[test]
    fn backoff_caps_at_sixty_seconds() {
        assert_eq!(backoff_delay(1), Duration::from_secs_f64(1.0));
        assert_eq!(backoff_delay(2), Duration::from_secs_f64(2.0));
        assert_eq!(backoff_delay(10), Duration::from_secs_f64(60.0));
    }

    #[tokio::test]
    async fn exhausted_retries_end_in_failed_not_abandoned() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let delivery = WebhookDelivery::new(Client::new());
        let event = super::super::events::create_system_event(
            super::super::events::EventType::ServerStarted,
            serde_json::json!({}),
            "test",
        );
        let result = delivery
            .deliver_event("sub-1", &server.uri(), &event, &HashMap::new(), None)
            .await;

        assert_eq!(result.status, DeliveryStatus::Failed);
        assert_eq!(result.attempts.len(), (MAX_RETRIES + 1) as usize);
    }

    #[tokio::test]
    async fn client_error_is_abandoned_without_retry() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let delivery = WebhookDelivery::new(Client::new());
        let event = super::super::events::create_system_event(
            super::super::events::EventType::ServerStarted,
            serde_json::json!({}),
            "test",
        );
        let result = delivery
            .deliver_event("sub-1", &server.uri(), &event, &HashMap::new(), None)
            .await;

        assert_eq!(result.status, DeliveryStatus::Abandoned);
        assert_eq!(result.attempts.len(), 1);
    }

    #[tokio::test]
    async fn headers_carry_delivery_id_and_subscription_extras() {
        let delivery = WebhookDelivery::new(Client::new());
        let mut extra = HashMap::new();
        extra.insert("X-Tenant".to_string(), "acme".to_string());
        let headers = delivery.prepare_headers("delivery-123", &extra);

        assert_eq!(headers.get("X-Webhook-Delivery").unwrap(), "delivery-123");
        assert_eq!(headers.get("X-Tenant").unwrap(), "acme");
        assert_eq!(headers.get("User-Agent").unwrap(), "Veris-Memory-MCP-Server/1.0");
    }
}
