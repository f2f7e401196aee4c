//! Bounded in-memory LRU cache backend

use super::Cache;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// In-memory LRU cache. Capacity comes from `cache.inmemory.size`; the
/// least-recently-used entry is evicted on insert overflow. Per-key
/// operations are linearized by the inner mutex.
pub struct InMemoryCache {
    inner: Mutex<LruCache<String, serde_json::Value>>,
}

impl InMemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(1).expect("1 is non-zero"));
        InMemoryCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn contains(&self, key: &str) -> bool {
        self.inner.lock().expect("cache lock poisoned").contains(key)
    }

    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.lock().expect("cache lock poisoned").get(key).cloned()
    }

    async fn set(&self, key: &str, value: serde_json::Value) {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .put(key.to_string(), value);
    }

    async fn clear(&self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = InMemoryCache::new(4);
        cache.set("a", json!({"v": 1})).await;
        assert!(cache.contains("a").await);
        assert_eq!(cache.get("a").await, Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_lru_eviction_on_overflow() {
        let cache = InMemoryCache::new(2);
        cache.set("a", json!(1)).await;
        cache.set("b", json!(2)).await;
        // Touch "a" so "b" becomes the eviction candidate
        cache.get("a").await;
        cache.set("c", json!(3)).await;

        assert!(cache.contains("a").await);
        assert!(!cache.contains("b").await);
        assert!(cache.contains("c").await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new(2);
        cache.set("a", json!(1)).await;
        cache.clear().await;
        assert!(!cache.contains("a").await);
    }

    #[tokio::test]
    async fn test_zero_capacity_clamps_to_one() {
        let cache = InMemoryCache::new(0);
        cache.set("a", json!(1)).await;
        assert!(cache.contains("a").await);
    }
}
