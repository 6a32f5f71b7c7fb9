/// Bounded in-memory metrics collection, aggregation, and cleanup.
///
/// Grounded on `analytics/collector.py::MetricsCollector`: per-series ring
/// buffers, a background aggregation loop, a background cleanup loop, and
/// the histogram/timer percentile calculation by linear interpolation.
/// `tokio::task`/`tokio::sync` replace asyncio's task/lock primitives.
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const MAX_POINTS_PER_SERIES: usize = 10_000;
const AGGREGATION_INTERVAL_SECS: u64 = 60;
const CLEANUP_INTERVAL_SECS: u64 = 300;
const DEFAULT_RETENTION_SECS: i64 = 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Timer,
    Operation,
    Usage,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<f64>,
    pub success: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedMetric {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

struct Series {
    metric_type: MetricType,
    points: VecDeque<MetricPoint>,
}

struct Inner {
    series: HashMap<String, Series>,
    operations: HashMap<String, OperationMetrics>,
    retention_secs: i64,
}

/// Background-driven metrics store. Cloning shares the same underlying
/// state; `start`/`stop` own the two background tasks.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Inner>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                series: HashMap::new(),
                operations: HashMap::new(),
                retention_secs: DEFAULT_RETENTION_SECS,
            })),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn start(&self) {
        info!("starting metrics collector background loops");
        let aggregation = {
            let this = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(AGGREGATION_INTERVAL_SECS));
                loop {
                    ticker.tick().await;
                    this.perform_aggregation().await;
                }
            })
        };
        let cleanup = {
            let this = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
                loop {
                    ticker.tick().await;
                    this.cleanup_old_metrics().await;
                }
            })
        };
        let mut tasks = self.tasks.lock().await;
        tasks.push(aggregation);
        tasks.push(cleanup);
    }

    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("metrics collector stopped");
    }

    pub async fn record_metric(&self, name: &str, metric_type: MetricType, value: f64, tags: HashMap<String, String>) {
        let point = MetricPoint {
            name: name.to_string(),
            metric_type,
            value,
            timestamp: Utc::now(),
            tags,
        };

        let mut inner = self.inner.lock().await;
        let series = inner.series.entry(Self::metric_key(name, &point.tags)).or_insert_with(|| Series {
            metric_type,
            points: VecDeque::new(),
        });

        if series.points.len() >= MAX_POINTS_PER_SERIES {
            series.points.pop_front();
        }
        series.points.push_back(point);
    }

    pub async fn record_counter(&self, name: &str, value: f64, tags: HashMap<String, String>) {
        self.record_metric(name, MetricType::Counter, value, tags).await;
    }

    pub async fn record_gauge(&self, name: &str, value: f64, tags: HashMap<String, String>) {
        self.record_metric(name, MetricType::Gauge, value, tags).await;
    }

    pub async fn record_histogram(&self, name: &str, value: f64, tags: HashMap<String, String>) {
        self.record_metric(name, MetricType::Histogram, value, tags).await;
    }

    pub async fn start_operation(&self, operation_id: &str, operation: &str) {
        let mut inner = self.inner.lock().await;
        inner.operations.insert(
            operation_id.to_string(),
            OperationMetrics {
                operation: operation.to_string(),
                started_at: Utc::now(),
                completed_at: None,
                duration_ms: None,
                success: None,
            },
        );
    }

    pub async fn complete_operation(&self, operation_id: &str, success: bool) -> Option<OperationMetrics> {
        let mut inner = self.inner.lock().await;
        let metrics = inner.operations.get_mut(operation_id)?;
        let now = Utc::now();
        metrics.completed_at = Some(now);
        metrics.duration_ms = Some((now - metrics.started_at).num_milliseconds() as f64);
        metrics.success = Some(success);
        let snapshot = metrics.clone();

        drop(inner);
        let metric_type = if success { MetricType::Operation } else { MetricType::Error };
        let mut tags = HashMap::new();
        tags.insert("operation".to_string(), snapshot.operation.clone());
        self.record_metric(
            &format!("operation.{}.duration_ms", snapshot.operation),
            metric_type,
            snapshot.duration_ms.unwrap_or(0.0),
            tags,
        )
        .await;

        Some(snapshot)
    }

    pub async fn get_metrics(&self, name: &str) -> Vec<MetricPoint> {
        let inner = self.inner.lock().await;
        inner
            .series
            .iter()
            .filter(|(key, _)| key.starts_with(name))
            .flat_map(|(_, series)| series.points.iter().cloned())
            .collect()
    }

    pub async fn get_aggregated_metrics(&self) -> HashMap<String, AggregatedMetric> {
        let inner = self.inner.lock().await;
        inner
            .series
            .iter()
            .map(|(key, series)| (key.clone(), aggregate(series)))
            .collect()
    }

    pub async fn get_stats(&self) -> serde_json::Value {
        let inner = self.inner.lock().await;
        serde_json::json!({
            "series_count": inner.series.len(),
            "active_operations": inner.operations.values().filter(|m| m.completed_at.is_none()).count(),
            "total_points": inner.series.values().map(|s| s.points.len()).sum::<usize>(),
        })
    }

    async fn perform_aggregation(&self) {
        let aggregated = self.get_aggregated_metrics().await;
        debug!(series = aggregated.len(), "performed metrics aggregation");
    }

    async fn cleanup_old_metrics(&self) {
        let mut inner = self.inner.lock().await;
        let retention = inner.retention_secs;
        let cutoff = Utc::now() - chrono::Duration::seconds(retention);
        let mut removed = 0usize;
        for series in inner.series.values_mut() {
            let before = series.points.len();
            series.points.retain(|point| point.timestamp >= cutoff);
            removed += before - series.points.len();
        }
        if removed > 0 {
            debug!(removed, "cleaned up expired metric points");
        }
    }

    fn metric_key(name: &str, tags: &HashMap<String, String>) -> String {
        if tags.is_empty() {
            return name.to_string();
        }
        let mut pairs: Vec<_> = tags.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let tag_str = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
        format!("{name}#{tag_str}")
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn aggregate(series: &Series) -> AggregatedMetric {
    let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
    if values.is_empty() {
        return AggregatedMetric {
            count: 0,
            sum: 0.0,
            min: 0.0,
            max: 0.0,
            avg: 0.0,
            p50: None,
            p95: None,
            p99: None,
        };
    }

    let sum: f64 = values.iter().sum();
    let count = values.len() as u64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = sum / count as f64;

    let (p50, p95, p99) = match series.metric_type {
        MetricType::Histogram | MetricType::Timer | MetricType::Operation => {
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            (
                Some(percentile(&sorted, 0.50)),
                Some(percentile(&sorted, 0.95)),
                Some(percentile(&sorted, 0.99)),
            )
        }
        _ => (None, None, None),
    };

    AggregatedMetric {
        count,
        sum,
        min,
        max,
        avg,
        p50,
        p95,
        p99,
    }
}

/// Linear-interpolation percentile over a pre-sorted slice.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = fraction * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_aggregates_counter() {
        let collector = MetricsCollector::new();
        collector.record_counter("requests", 1.0, HashMap::new()).await;
        collector.record_counter("requests", 1.0, HashMap::new()).await;
        let aggregated = collector.get_aggregated_metrics().await;
        let metric = aggregated.get("requests").unwrap();
        assert_eq!(metric.count, 2);
        assert_eq!(metric.sum, 2.0);
    }

    #[tokio::test]
    async fn operation_lifecycle_records_duration() {
        let collector = MetricsCollector::new();
        collector.start_operation("op-1", "store_context").await;
        let result = collector.complete_operation("op-1", true).await.unwrap();
        assert_eq!(result.success, Some(true));
        assert!(result.duration_ms.is_some());
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.5), 3.0);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 5.0);
    }

    #[tokio::test]
    async fn ring_buffer_drops_oldest_beyond_cap() {
        let collector = MetricsCollector::new();
        for i in 0..(MAX_POINTS_PER_SERIES + 5) {
            collector.record_gauge("g", i as f64, HashMap::new()).await;
        }
        let points = collector.get_metrics("g").await;
        assert_eq!(points.len(), MAX_POINTS_PER_SERIES);
    }
}
