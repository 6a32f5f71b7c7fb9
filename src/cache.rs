/// Operation-keyed TTL+LRU cache fronting read-only backend calls.
///
/// Not grounded on a single Python file (no dedicated cache module survived
/// distillation into `original_source/`); shape is inferred directly from
/// spec.md §4.F and, for the `sha2`-based key derivation, from the pattern
/// already used for payload signing in `webhooks/events.py`. Noted as an
/// inferred module in DESIGN.md.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};

const KEY_LENGTH: usize = 16;

struct Entry {
    value: Value,
    stored_at: Instant,
    last_used: Instant,
}

pub struct Cache {
    max_entries: usize,
    ttl: Duration,
    entries: HashMap<String, Entry>,
}

impl Cache {
    pub fn new(max_entries: usize, ttl_seconds: u64) -> Self {
        Self {
            max_entries,
            ttl: Duration::from_secs(ttl_seconds),
            entries: HashMap::new(),
        }
    }

    /// `sha256(operation + canonical_json(kwargs))`, truncated to 16 hex
    /// chars. `kwargs` is canonicalized via `serde_json`'s default map
    /// ordering (BTreeMap-backed when the `preserve_order` feature is off),
    /// giving a stable key regardless of argument insertion order.
    pub fn key(operation: &str, kwargs: &Value) -> String {
        let canonical = canonical_json(kwargs);
        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)[..KEY_LENGTH].to_string()
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        let expired = self
            .entries
            .get(key)
            .map(|entry| entry.stored_at.elapsed() > self.ttl)
            .unwrap_or(false);

        if expired {
            self.entries.remove(key);
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.last_used = Instant::now();
        Some(entry.value.clone())
    }

    pub fn put(&mut self, key: String, value: Value) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict_lru();
        }

        let now = Instant::now();
        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: now,
                last_used: now,
            },
        );
    }

    fn evict_lru(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&oldest_key);
        }
    }

    /// Any mutation invalidates the entire cache rather than tracking
    /// per-key dependency (spec.md §4.F: broad invalidation).
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), sort_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_is_stable_regardless_of_argument_order() {
        let a = Cache::key("retrieve_context", &json!({"query": "x", "limit": 10}));
        let b = Cache::key("retrieve_context", &json!({"limit": 10, "query": "x"}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn different_operations_get_different_keys() {
        let a = Cache::key("retrieve_context", &json!({"query": "x"}));
        let b = Cache::key("search_context", &json!({"query": "x"}));
        assert_ne!(a, b);
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let mut cache = Cache::new(10, 0);
        let key = Cache::key("op", &json!({}));
        cache.put(key.clone(), json!("value"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn lru_eviction_drops_least_recently_used() {
        let mut cache = Cache::new(2, 60);
        cache.put("a".to_string(), json!(1));
        cache.put("b".to_string(), json!(2));
        cache.get("a");
        cache.put("c".to_string(), json!(3));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let mut cache = Cache::new(10, 60);
        cache.put("a".to_string(), json!(1));
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
