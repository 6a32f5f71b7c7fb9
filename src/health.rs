/// Named, timeout-bounded health checks with aggregate status rollup.
///
/// Grounded on `utils/health.py::HealthChecker`: register/unregister/run
/// semantics, the critical-vs-degraded aggregation rule, and the standard
/// checks (`server`, `veris_connection`, `cache`) created at startup.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::cache::Cache;
use crate::client::VerisClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub duration_ms: f64,
    pub critical: bool,
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> (HealthStatus, String);
}

struct Registration {
    check: Arc<dyn HealthCheck>,
    timeout: Duration,
    critical: bool,
}

pub struct HealthChecker {
    checks: RwLock<HashMap<String, Registration>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            checks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_check(&self, name: &str, check: Arc<dyn HealthCheck>, timeout: Duration, critical: bool) {
        self.checks.write().await.insert(
            name.to_string(),
            Registration {
                check,
                timeout,
                critical,
            },
        );
    }

    pub async fn unregister_check(&self, name: &str) -> bool {
        self.checks.write().await.remove(name).is_some()
    }

    pub async fn run_check(&self, name: &str) -> Option<HealthCheckResult> {
        let registration = {
            let checks = self.checks.read().await;
            let reg = checks.get(name)?;
            (Arc::clone(&reg.check), reg.timeout, reg.critical)
        };
        Some(Self::execute(name, registration.0, registration.1, registration.2).await)
    }

    pub async fn run_all_checks(&self) -> (HealthStatus, Vec<HealthCheckResult>) {
        let registrations: Vec<(String, Arc<dyn HealthCheck>, Duration, bool)> = {
            let checks = self.checks.read().await;
            checks
                .iter()
                .map(|(name, reg)| (name.clone(), Arc::clone(&reg.check), reg.timeout, reg.critical))
                .collect()
        };

        let mut results = Vec::new();
        for (name, check, timeout, critical) in registrations {
            results.push(Self::execute(&name, check, timeout, critical).await);
        }

        let overall = determine_overall_status(&results);
        (overall, results)
    }

    async fn execute(name: &str, check: Arc<dyn HealthCheck>, timeout: Duration, critical: bool) -> HealthCheckResult {
        let start = Instant::now();
        let outcome = tokio::time::timeout(timeout, check.check()).await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let (status, message) = match outcome {
            Ok((status, message)) => (status, message),
            Err(_) => {
                warn!(check = name, "health check timed out");
                (HealthStatus::Unhealthy, "check timed out".to_string())
            }
        };

        HealthCheckResult {
            name: name.to_string(),
            status,
            message,
            duration_ms,
            critical,
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Unhealthy if any critical check is unhealthy; else degraded if any
/// non-critical check is unhealthy; else healthy.
fn determine_overall_status(results: &[HealthCheckResult]) -> HealthStatus {
    if results
        .iter()
        .any(|r| r.critical && r.status == HealthStatus::Unhealthy)
    {
        return HealthStatus::Unhealthy;
    }
    if results.iter().any(|r| r.status != HealthStatus::Healthy) {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}

pub struct ServerCheck;

#[async_trait]
impl HealthCheck for ServerCheck {
    async fn check(&self) -> (HealthStatus, String) {
        (HealthStatus::Healthy, "server running".to_string())
    }
}

pub struct VerisConnectionCheck {
    client: Arc<VerisClient>,
}

impl VerisConnectionCheck {
    pub fn new(client: Arc<VerisClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthCheck for VerisConnectionCheck {
    async fn check(&self) -> (HealthStatus, String) {
        if !self.client.connected().await {
            return (HealthStatus::Unhealthy, "backend connection is down".to_string());
        }
        match self.client.list_context_types().await {
            Ok(_) => (HealthStatus::Healthy, "backend reachable".to_string()),
            Err(err) => (HealthStatus::Unhealthy, format!("backend probe failed: {err}")),
        }
    }
}

pub struct CacheCheck {
    cache: Arc<RwLock<Cache>>,
    max_entries: usize,
}

impl CacheCheck {
    pub fn new(cache: Arc<RwLock<Cache>>, max_entries: usize) -> Self {
        Self { cache, max_entries }
    }
}

#[async_trait]
impl HealthCheck for CacheCheck {
    async fn check(&self) -> (HealthStatus, String) {
        let len = self.cache.read().await.len();
        let utilization = if self.max_entries == 0 {
            0.0
        } else {
            len as f64 / self.max_entries as f64
        };
        if utilization > 0.90 {
            (HealthStatus::Degraded, format!("cache at {:.0}% capacity", utilization * 100.0))
        } else {
            (HealthStatus::Healthy, "cache within capacity".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(HealthStatus);

    #[async_trait]
    impl HealthCheck for Always {
        async fn check(&self) -> (HealthStatus, String) {
            (self.0, "fixed".to_string())
        }
    }

    #[tokio::test]
    async fn critical_unhealthy_dominates() {
        let checker = HealthChecker::new();
        checker
            .register_check("critical", Arc::new(Always(HealthStatus::Unhealthy)), Duration::from_secs(1), true)
            .await;
        checker
            .register_check("noncritical", Arc::new(Always(HealthStatus::Healthy)), Duration::from_secs(1), false)
            .await;
        let (status, _) = checker.run_all_checks().await;
        assert_eq!(status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn noncritical_unhealthy_degrades_only() {
        let checker = HealthChecker::new();
        checker
            .register_check("noncritical", Arc::new(Always(HealthStatus::Unhealthy)), Duration::from_secs(1), false)
            .await;
        let (status, _) = checker.run_all_checks().await;
        assert_eq!(status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn all_healthy_is_healthy() {
        let checker = HealthChecker::new();
        checker
            .register_check("a", Arc::new(Always(HealthStatus::Healthy)), Duration::from_secs(1), true)
            .await;
        let (status, _) = checker.run_all_checks().await;
        assert_eq!(status, HealthStatus::Healthy);
    }
}
