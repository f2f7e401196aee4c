//! Cache backend that caches nothing

use super::Cache;
use async_trait::async_trait;

/// Empty cache implementation: every operation is a no-op and `get` is
/// always a miss.
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn contains(&self, _key: &str) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    async fn set(&self, _key: &str, _value: serde_json::Value) {}

    async fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_cache_never_stores() {
        let cache = NullCache;
        cache.set("k", serde_json::json!(1)).await;
        assert!(!cache.contains("k").await);
        assert!(cache.get("k").await.is_none());
    }
}
