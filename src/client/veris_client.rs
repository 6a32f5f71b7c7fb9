/// Pooled HTTP client for the upstream context-memory backend.
///
/// Grounded on `client/veris_client.py`: connection lifecycle, auth header
/// construction, the context-type mapping policy, per-tool HTTP calls, the
/// analytics/metrics read-side facade, and the retry-with-jitter wrapper.
/// Three documented source bugs are fixed rather than reproduced (spec.md
/// §9, DESIGN.md): `delete_context`/`list_context_types`/analytics go
/// through the same pooled client instead of a never-assigned `_client`
/// field; `connected` reflects an actual successful `/health` probe; and
/// `store_context` always sends the mapped type.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ClientError;

const RETRY_BASE_SECONDS: f64 = 1.0;
const RETRY_CAP_SECONDS: f64 = 10.0;

/// The upstream's closed set of valid context types.
pub const VALID_CONTEXT_TYPES: &[&str] = &["design", "decision", "trace", "sprint", "log"];

pub struct VerisClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    user_id: Option<String>,
    max_retries: u32,
    connected: RwLock<bool>,
    analytics_cache: Mutex<HashMap<String, (Instant, Value)>>,
}

impl VerisClient {
    pub fn new(base_url: String, api_key: Option<String>, user_id: Option<String>, timeout_ms: u64, max_retries: u32) -> Result<Self, ClientError> {
        let http = Client::builder()
            .pool_max_idle_per_host(30)
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ClientError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            api_key,
            user_id,
            max_retries,
            connected: RwLock::new(false),
            analytics_cache: Mutex::new(HashMap::new()),
        })
    }

    /// `connected = (client exists) && (last /health probe succeeded)`.
    pub async fn connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Probe `/health`; re-probes on demand if a prior request failed.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        let result = self
            .http
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await;

        let healthy = matches!(&result, Ok(resp) if resp.status().is_success());
        *self.connected.write().await = healthy;

        match result {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(ClientError::Status {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
            Err(err) => Err(ClientError::Request { url, source: err }),
        }
    }

    fn auth_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "application/json".parse().unwrap(),
        );
        if let Some(key) = &self.api_key {
            // The configured key may be `prefix:user:role:flag`; only the
            // prefix before the first colon is ever sent on the wire.
            let prefix = key.split(':').next().unwrap_or(key);
            if let Ok(value) = prefix.parse() {
                headers.insert("X-API-Key", value);
            }
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .headers(self.auth_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Request {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            *self.connected.write().await = false;
            return Err(ClientError::Status {
                status,
                body: body_text,
            });
        }

        let value = response.json::<Value>().await.map_err(|e| ClientError::Request {
            url,
            source: e,
        })?;
        Ok(value)
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let url = self.url(path);
        let response = self
            .http
            .get(&url)
            .headers(self.auth_headers())
            .send()
            .await
            .map_err(|e| ClientError::Request {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status,
                body: body_text,
            });
        }

        response.json::<Value>().await.map_err(|e| ClientError::Request { url, source: e })
    }

    /// `delay = min(base * 2^attempt + U(0,1), cap)`.
    fn backoff_delay(attempt: u32) -> Duration {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let raw = RETRY_BASE_SECONDS * 2f64.powi(attempt as i32) + jitter;
        Duration::from_secs_f64(raw.min(RETRY_CAP_SECONDS))
    }

    /// Retry wrapper for write-like operations (spec.md §4.D). Does not
    /// retry on a 4xx client error; any other failure retries up to
    /// `max_retries` times.
    async fn with_retry<F, Fut>(&self, operation: &str, mut f: F) -> Result<Value, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Value, ClientError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(ClientError::Status { status, body }) if (400..500).contains(&status) => {
                    return Err(ClientError::Status { status, body });
                }
                Err(err) if attempt < self.max_retries => {
                    let delay = Self::backoff_delay(attempt);
                    warn!(operation, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying backend call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Context-type mapping policy: exact match, then a fixed synonym
    /// table, then a keyword rule, then default `log`. Idempotent.
    pub fn map_context_type(input: &str) -> (String, Option<String>) {
        if VALID_CONTEXT_TYPES.contains(&input) {
            return (input.to_string(), None);
        }

        let fixed: &[(&str, &str)] = &[
            ("sprint_summary", "sprint"),
            ("sprint_planning", "sprint"),
            ("sprint_retro", "sprint"),
            ("architecture", "design"),
            ("design_doc", "design"),
            ("risk_assessment", "log"),
            ("knowledge", "trace"),
            ("meeting_notes", "log"),
            ("requirement", "design"),
            ("research", "trace"),
        ];
        if let Some((_, mapped)) = fixed.iter().find(|(key, _)| *key == input) {
            return (mapped.to_string(), Some(input.to_string()));
        }

        let lowered = input.to_lowercase();
        let mapped = if lowered.contains("sprint") {
            "sprint"
        } else if ["design", "implement", "architect", "spec"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            "design"
        } else if ["decision", "plan", "strategy", "future"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            "decision"
        } else if ["trace", "debug", "history", "context"]
            .iter()
            .any(|k| lowered.contains(k))
        {
            "trace"
        } else {
            "log"
        };

        (mapped.to_string(), Some(input.to_string()))
    }

    pub async fn store_context(
        &self,
        context_type: &str,
        content: Value,
        metadata: Value,
    ) -> Result<Value, ClientError> {
        let (mapped_type, original) = Self::map_context_type(context_type);
        let mut metadata = metadata;
        if let (Some(original), Value::Object(map)) = (&original, &mut metadata) {
            map.insert("original_type".to_string(), json!(original));
        }

        self.with_retry("store_context", || {
            let body = json!({
                "content": content,
                "type": mapped_type,
                "metadata": metadata,
            });
            self.post_json("/tools/store_context", body)
        })
        .await
    }

    pub async fn retrieve_context(
        &self,
        query: &str,
        limit: u32,
        context_type: Option<&str>,
        metadata_filters: Option<Value>,
    ) -> Result<Value, ClientError> {
        let body = json!({
            "query": query,
            "limit": limit,
            "type": context_type,
            "metadata_filters": metadata_filters,
        });
        self.post_json("/tools/retrieve_context", body).await
    }

    pub async fn search_context(&self, query: &str, filters: Value, limit: u32) -> Result<Value, ClientError> {
        let body = json!({
            "query": query,
            "filters": filters,
            "limit": limit,
        });
        self.post_json("/tools/search_context", body).await
    }

    pub async fn delete_context(&self, context_id: &str) -> Result<Value, ClientError> {
        self.post_json("/tools/delete_context", json!({ "context_id": context_id }))
            .await
    }

    pub async fn list_context_types(&self) -> Result<Vec<String>, ClientError> {
        let value = self.get_json("/tools/list_context_types").await.or_else(|_| {
            Ok::<Value, ClientError>(json!({ "types": VALID_CONTEXT_TYPES }))
        })?;
        let types = value
            .get("types")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_else(|| VALID_CONTEXT_TYPES.iter().map(|s| s.to_string()).collect());
        Ok(types)
    }

    pub async fn upsert_fact(
        &self,
        fact_key: &str,
        fact_value: &str,
        user_id: Option<&str>,
        metadata: Option<Value>,
        create_relationships: bool,
    ) -> Result<Value, ClientError> {
        let user_id = user_id.or(self.user_id.as_deref());
        self.with_retry("upsert_fact", || {
            let body = json!({
                "fact_key": fact_key,
                "fact_value": fact_value,
                "user_id": user_id,
                "metadata": metadata,
                "create_relationships": create_relationships,
            });
            self.post_json("/tools/upsert_fact", body)
        })
        .await
    }

    pub async fn get_user_facts(
        &self,
        user_id: &str,
        limit: u32,
        include_forgotten: bool,
    ) -> Result<Value, ClientError> {
        self.with_retry("get_user_facts", || {
            let body = json!({
                "user_id": user_id,
                "limit": limit,
                "include_forgotten": include_forgotten,
            });
            self.post_json("/tools/get_user_facts", body)
        })
        .await
    }

    pub async fn forget_context(
        &self,
        context_id: &str,
        retention_days: u32,
        reason: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.with_retry("forget_context", || {
            let body = json!({
                "context_id": context_id,
                "retention_days": retention_days,
                "reason": reason,
            });
            self.post_json("/tools/forget_context", body)
        })
        .await
    }

    pub async fn query_graph(
        &self,
        query: &str,
        parameters: Option<Value>,
        limit: u32,
    ) -> Result<Value, ClientError> {
        self.with_retry("query_graph", || {
            let body = json!({
                "query": query,
                "parameters": parameters,
                "limit": limit,
            });
            self.post_json("/tools/query_graph", body)
        })
        .await
    }

    pub async fn update_scratchpad(
        &self,
        agent_id: &str,
        content: Value,
        merge: bool,
    ) -> Result<Value, ClientError> {
        self.with_retry("update_scratchpad", || {
            let body = json!({
                "agent_id": agent_id,
                "content": content,
                "merge": merge,
            });
            self.post_json("/tools/update_scratchpad", body)
        })
        .await
    }

    pub async fn get_agent_state(
        &self,
        agent_id: &str,
        include_scratchpad: bool,
        include_recent_contexts: bool,
    ) -> Result<Value, ClientError> {
        self.with_retry("get_agent_state", || {
            let body = json!({
                "agent_id": agent_id,
                "include_scratchpad": include_scratchpad,
                "include_recent_contexts": include_recent_contexts,
            });
            self.post_json("/tools/get_agent_state", body)
        })
        .await
    }

    /// Analytics/metrics read-side facade over `/api/dashboard/analytics`.
    /// Cached in-memory (30s for analytics views, 60s for the raw metrics
    /// view) keyed by endpoint + arguments.
    pub async fn analytics(&self, minutes: u32, include_insights: bool, view: AnalyticsView) -> Value {
        let cache_key = format!("{view:?}:{minutes}:{include_insights}");
        let ttl = match view {
            AnalyticsView::Metrics => Duration::from_secs(60),
            _ => Duration::from_secs(30),
        };

        if let Some(cached) = self.cached_analytics(&cache_key, ttl) {
            return cached;
        }

        let path = format!(
            "/api/dashboard/analytics?minutes={minutes}&include_insights={include_insights}"
        );
        let raw = self.get_json(&path).await.unwrap_or_else(|err| {
            debug!(error = %err, "analytics fetch failed, degrading to zeros");
            json!({})
        });

        let shaped = shape_analytics(&raw, view);
        self.analytics_cache
            .lock()
            .unwrap()
            .insert(cache_key, (Instant::now(), shaped.clone()));
        shaped
    }

    fn cached_analytics(&self, key: &str, ttl: Duration) -> Option<Value> {
        let cache = self.analytics_cache.lock().unwrap();
        cache.get(key).and_then(|(stored_at, value)| {
            if stored_at.elapsed() < ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AnalyticsView {
    UsageStats,
    PerformanceInsights,
    RealTimeMetrics,
    Summary,
    Metrics,
}

/// Transform the upstream's raw payload into one of the four fixed shapes.
/// Degrades to zeros when expected keys are absent (spec.md §9).
fn shape_analytics(raw: &Value, view: AnalyticsView) -> Value {
    let stats = raw.get("global_request_stats").cloned().unwrap_or_default();
    let get_num = |key: &str| stats.get(key).and_then(Value::as_f64).unwrap_or(0.0);

    match view {
        AnalyticsView::UsageStats | AnalyticsView::Summary => json!({
            "total_requests": get_num("total_requests"),
            "error_rate_percent": get_num("error_rate_percent"),
            "requests_per_minute": get_num("requests_per_minute"),
        }),
        AnalyticsView::PerformanceInsights => json!({
            "avg_duration_ms": get_num("avg_duration_ms"),
            "p95_duration_ms": get_num("p95_duration_ms"),
            "p99_duration_ms": get_num("p99_duration_ms"),
        }),
        AnalyticsView::RealTimeMetrics | AnalyticsView::Metrics => json!({
            "total_requests": get_num("total_requests"),
            "avg_duration_ms": get_num("avg_duration_ms"),
            "error_rate_percent": get_num("error_rate_percent"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_unchanged() {
        let (mapped, original) = VerisClient::map_context_type("design");
        assert_eq!(mapped, "design");
        assert!(original.is_none());
    }

    #[test]
    fn fixed_table_maps_and_records_original() {
        let (mapped, original) = VerisClient::map_context_type("sprint_summary");
        assert_eq!(mapped, "sprint");
        assert_eq!(original.as_deref(), Some("sprint_summary"));
    }

    #[test]
    fn keyword_fallback() {
        let (mapped, _) = VerisClient::map_context_type("architecture_spec");
        assert_eq!(mapped, "design");
    }

    #[test]
    fn default_is_log() {
        let (mapped, _) = VerisClient::map_context_type("mystery_type");
        assert_eq!(mapped, "log");
    }

    #[test]
    fn mapping_is_idempotent() {
        let (once, _) = VerisClient::map_context_type("sprint_summary");
        let (twice, _) = VerisClient::map_context_type(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn analytics_degrades_to_zeros_on_missing_keys() {
        let shaped = shape_analytics(&json!({}), AnalyticsView::UsageStats);
        assert_eq!(shaped["total_requests"], 0.0);
    }

    #[tokio::test]
    async fn connect_reflects_a_successful_health_probe() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/health"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let client = VerisClient::new(server.uri(), None, None, 5_000, 3).unwrap();
        assert!(!client.connected().await);
        client.connect().await.unwrap();
        assert!(client.connected().await);
    }

    #[tokio::test]
    async fn connect_leaves_connected_false_on_failure() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/health"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = VerisClient::new(server.uri(), None, None, 5_000, 3).unwrap();
        assert!(client.connect().await.is_err());
        assert!(!client.connected().await);
    }

    #[tokio::test]
    async fn store_context_retries_a_server_error_then_succeeds() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/tools/store_context"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/tools/store_context"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({"id": "ctx-1"})))
            .mount(&server)
            .await;

        let client = VerisClient::new(server.uri(), None, None, 5_000, 3).unwrap();
        let result = client
            .store_context("design", json!({"text": "note"}), json!({}))
            .await
            .unwrap();
        assert_eq!(result["id"], "ctx-1");
    }

    #[tokio::test]
    async fn store_context_does_not_retry_a_client_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/tools/store_context"))
            .respond_with(wiremock::ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client = VerisClient::new(server.uri(), None, None, 5_000, 3).unwrap();
        let err = client
            .store_context("design", json!({"text": "note"}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 400, .. }));
    }
}
