/// Paginated streaming and bounded-concurrency batch execution.
///
/// Grounded on `streaming/engine.py::StreamingEngine`: offset-based
/// pagination with an inter-page pause, a global concurrent-stream cap, and
/// windowed batch processing with per-item retry. The default page size
/// (100, not the Python source's 1024) follows spec.md §4.G, which is
/// authoritative over the source default.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;

const DEFAULT_CHUNK_SIZE: u32 = 100;
const DEFAULT_STREAM_CONCURRENCY: usize = 10;
const INTER_PAGE_PAUSE_MS: u64 = 10;
const ITEM_RETRY_BASE_MS: u64 = 100;
const MAX_ITEM_RETRIES: u32 = 2;

#[derive(Debug, Clone, Serialize)]
pub struct StreamChunk {
    pub stream_id: String,
    pub offset: u32,
    pub items: Vec<Value>,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItemResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Running,
    Completed,
    Cancelled,
}

pub struct StreamingEngine {
    stream_concurrency: Arc<Semaphore>,
    active_streams: Mutex<HashMap<String, StreamState>>,
}

impl StreamingEngine {
    pub fn new() -> Self {
        Self {
            stream_concurrency: Arc::new(Semaphore::new(DEFAULT_STREAM_CONCURRENCY)),
            active_streams: Mutex::new(HashMap::new()),
        }
    }

    /// Pages through `fetch_page(offset, chunk_size)` until a page returns
    /// fewer items than requested, pausing ~10ms between pages. `fetch_page`
    /// performs the actual backend call (retrieve_context/search_context).
    pub async fn stream_search_results<F, Fut>(
        &self,
        chunk_size: Option<u32>,
        mut fetch_page: F,
    ) -> Result<Vec<StreamChunk>, ClientError>
    where
        F: FnMut(u32, u32) -> Fut,
        Fut: Future<Output = Result<Vec<Value>, ClientError>>,
    {
        let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1);
        let stream_id = Uuid::new_v4().to_string();
        let _permit = self.stream_concurrency.acquire().await;
        self.active_streams.lock().await.insert(stream_id.clone(), StreamState::Running);

        let mut chunks = Vec::new();
        let mut offset = 0u32;
        let mut total_items = 0usize;

        loop {
            if self.is_cancelled(&stream_id).await {
                break;
            }

            let page = fetch_page(offset, chunk_size).await?;
            let is_final = page.len() < chunk_size as usize;
            total_items += page.len();

            chunks.push(StreamChunk {
                stream_id: stream_id.clone(),
                offset,
                items: page,
                is_final,
                summary: if is_final {
                    Some(serde_json::json!({ "total_items": total_items }))
                } else {
                    None
                },
            });

            if is_final {
                break;
            }

            offset += chunk_size;
            tokio::time::sleep(Duration::from_millis(INTER_PAGE_PAUSE_MS)).await;
        }

        self.active_streams.lock().await.insert(stream_id, StreamState::Completed);
        Ok(chunks)
    }

    pub async fn cancel_stream(&self, stream_id: &str) -> bool {
        let mut streams = self.active_streams.lock().await;
        if let Some(state) = streams.get_mut(stream_id) {
            if *state == StreamState::Running {
                *state = StreamState::Cancelled;
                return true;
            }
        }
        false
    }

    pub async fn get_stream_status(&self, stream_id: &str) -> Option<StreamState> {
        self.active_streams.lock().await.get(stream_id).copied()
    }

    pub async fn get_engine_stats(&self) -> Value {
        let streams = self.active_streams.lock().await;
        let running = streams.values().filter(|s| **s == StreamState::Running).count();
        serde_json::json!({
            "active_streams": running,
            "total_tracked_streams": streams.len(),
        })
    }

    async fn is_cancelled(&self, stream_id: &str) -> bool {
        matches!(self.active_streams.lock().await.get(stream_id), Some(StreamState::Cancelled))
    }

    /// Windowed concurrent batch execution with per-item retry
    /// (`2^attempt * 100ms` backoff).
    pub async fn run_batch<F, Fut>(&self, items: Vec<Value>, concurrency: usize, op: F) -> BatchResult
    where
        F: Fn(usize, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ClientError>> + Send,
    {
        let batch_id = Uuid::new_v4().to_string();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let op = Arc::new(op);

        let mut handles = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let op = Arc::clone(&op);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                execute_with_retry(index, item, op).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(item_result) => results.push(item_result),
                Err(err) => {
                    debug!(error = %err, "batch item task panicked");
                    results.push(BatchItemResult {
                        index: results.len(),
                        success: false,
                        error: Some("item task panicked".to_string()),
                        result: None,
                    });
                }
            }
        }
        results.sort_by_key(|r| r.index);

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;

        BatchResult {
            batch_id,
            total: results.len(),
            succeeded,
            failed,
            items: results,
        }
    }
}

impl Default for StreamingEngine {
    fn default() -> Self {
        Self::new()
    }
}

async fn execute_with_retry<F, Fut>(index: usize, item: Value, op: Arc<F>) -> BatchItemResult
where
    F: Fn(usize, Value) -> Fut,
    Fut: Future<Output = Result<Value, ClientError>>,
{
    let mut attempt = 0;
    loop {
        match op(index, item.clone()).await {
            Ok(value) => {
                return BatchItemResult {
                    index,
                    success: true,
                    error: None,
                    result: Some(value),
                }
            }
            Err(err) if attempt < MAX_ITEM_RETRIES => {
                let delay = Duration::from_millis(ITEM_RETRY_BASE_MS * 2u64.pow(attempt));
                debug!(index, attempt, error = %err, "retrying batch item");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return BatchItemResult {
                    index,
                    success: false,
                    error: Some(err.to_string()),
                    result: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn pages_until_short_page() {
        let engine = StreamingEngine::new();
        let chunks = engine
            .stream_search_results(Some(2), |offset, _| async move {
                let remaining = 5i32 - offset as i32;
                if remaining <= 0 {
                    return Ok(vec![]);
                }
                let count = remaining.min(2) as usize;
                Ok((0..count).map(|i| serde_json::json!(offset as usize + i)).collect())
            })
            .await
            .unwrap();

        assert!(chunks.last().unwrap().is_final);
        let total: usize = chunks.iter().map(|c| c.items.len()).sum();
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn batch_retries_then_succeeds() {
        let engine = StreamingEngine::new();
        let calls = Arc::new(AtomicU32::new(0));
        let items = vec![serde_json::json!("a"), serde_json::json!("b")];

        let calls_clone = Arc::clone(&calls);
        let result = engine
            .run_batch(items, 2, move |_index, _item| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 1 {
                        Err(ClientError::Other("transient".to_string()))
                    } else {
                        Ok(serde_json::json!("ok"))
                    }
                }
            })
            .await;

        assert_eq!(result.total, 2);
        assert_eq!(result.succeeded, 2);
    }
}
