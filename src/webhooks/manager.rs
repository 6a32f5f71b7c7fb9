/// Subscription registry and event dispatch fabric.
///
/// Grounded on the subscription/dispatch half of `webhooks/delivery.py`
/// and `webhooks/events.py`'s factory functions, with one deliberate
/// deviation from the Python source (spec.md §4.I, DESIGN.md): the event
/// queue is a bounded `tokio::sync::mpsc` channel drained with `try_send`
/// and drop-on-full, not a blocking put wrapped in try/except — no
/// back-pressure is allowed to reach the tool layer.
use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::delivery::WebhookDelivery;
use super::events::{Event, EventType};

const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
const DEFAULT_CONCURRENCY: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: String,
    pub url: String,
    pub event_types: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,
    pub active: bool,
}

impl Subscription {
    fn matches(&self, event_type: EventType) -> bool {
        self.active
            && (self.event_types.iter().any(|t| t == "*") || self.event_types.iter().any(|t| t == event_type.as_str()))
    }
}

pub struct WebhookManager {
    subscriptions: Mutex<HashMap<String, Subscription>>,
    sender: mpsc::Sender<Event>,
    receiver: Mutex<Option<mpsc::Receiver<Event>>>,
    delivery: Arc<WebhookDelivery>,
    semaphore: Arc<Semaphore>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl WebhookManager {
    pub fn new(http: Client) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        Arc::new(Self {
            subscriptions: Mutex::new(HashMap::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
            delivery: WebhookDelivery::new(http),
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            dispatcher: Mutex::new(None),
        })
    }

    pub async fn subscribe(
        &self,
        url: String,
        event_types: Vec<String>,
        headers: HashMap<String, String>,
        signing_secret: Option<String>,
    ) -> Subscription {
        let subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            url,
            event_types,
            headers,
            signing_secret,
            active: true,
        };
        self.subscriptions
            .lock()
            .await
            .insert(subscription.id.clone(), subscription.clone());
        subscription
    }

    pub async fn unsubscribe(&self, subscription_id: &str) -> bool {
        self.subscriptions.lock().await.remove(subscription_id).is_some()
    }

    pub async fn list_subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().await.values().cloned().collect()
    }

    /// Non-blocking enqueue; drops the event with a warning when the queue
    /// is saturated rather than applying back-pressure to the caller.
    pub fn publish(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            warn!(error = %err, "webhook event queue full, dropping event");
        }
    }

    /// Spawns the single background dispatcher task. Idempotent: a second
    /// call is a no-op if already running.
    pub async fn start(self: &Arc<Self>) {
        let mut dispatcher = self.dispatcher.lock().await;
        if dispatcher.is_some() {
            return;
        }

        let Some(mut receiver) = self.receiver.lock().await.take() else {
            return;
        };

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!("webhook dispatcher started");
            while let Some(event) = receiver.recv().await {
                this.dispatch(event).await;
            }
            info!("webhook dispatcher stopped");
        });
        *dispatcher = Some(handle);
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.dispatcher.lock().await.take() {
            handle.abort();
        }
    }

    async fn dispatch(&self, event: Event) {
        let matching: Vec<Subscription> = self
            .subscriptions
            .lock()
            .await
            .values()
            .filter(|s| s.matches(event.event_type))
            .cloned()
            .collect();

        for subscription in matching {
            let permit = Arc::clone(&self.semaphore);
            let delivery = Arc::clone(&self.delivery);
            let event = event.clone();
            tokio::spawn(async move {
                let _permit = permit.acquire_owned().await;
                delivery
                    .deliver_event(
                        &subscription.id,
                        &subscription.url,
                        &event,
                        &subscription.headers,
                        subscription.signing_secret.as_deref(),
                    )
                    .await;
            });
        }
    }

    pub async fn stats(&self) -> serde_json::Value {
        let subscriptions = self.subscriptions.lock().await;
        let delivery_stats = self.delivery.get_delivery_stats().await;
        serde_json::json!({
            "subscriptions": subscriptions.len(),
            "delivery": delivery_stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_matches_exact_and_wildcard() {
        let manager = WebhookManager::new(Client::new());
        let exact = manager
            .subscribe("http://example.test".to_string(), vec!["context.stored".to_string()], HashMap::new(), None)
            .await;
        assert!(exact.matches(EventType::ContextStored));
        assert!(!exact.matches(EventType::ContextDeleted));

        let wildcard = manager
            .subscribe("http://example.test".to_string(), vec!["*".to_string()], HashMap::new(), None)
            .await;
        assert!(wildcard.matches(EventType::ContextDeleted));
    }

    #[tokio::test]
    async fn unsubscribe_removes_entry() {
        let manager = WebhookManager::new(Client::new());
        let subscription = manager
            .subscribe("http://example.test".to_string(), vec!["*".to_string()], HashMap::new(), None)
            .await;
        assert!(manager.unsubscribe(&subscription.id).await);
        assert!(manager.list_subscriptions().await.is_empty());
    }
}
