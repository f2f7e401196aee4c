//! Process-wide key/value cache with pluggable backends
//!
//! A narrow interface shared by all concurrent requests. Values are
//! self-describing JSON documents; in practice only face-rectangle sets are
//! stored. Cache failures always degrade to a miss, never to a request
//! error.

use crate::config::Config;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

mod memory;
mod null;
mod redis;

pub use memory::InMemoryCache;
pub use null::NullCache;
pub use redis::RedisCache;

/// Simple interface to interact with the different cache backends
#[async_trait]
pub trait Cache: Send + Sync {
    /// Checks if a key exists in the cache
    async fn contains(&self, key: &str) -> bool;

    /// Returns a cached item if it exists
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Saves an item into the cache
    async fn set(&self, key: &str, value: serde_json::Value);

    /// Removes all items from the cache
    async fn clear(&self);
}

/// Builds the configured cache backend. An unknown or empty provider, an
/// inactive cache section and a failed Redis connection all fall back to
/// the null backend.
pub async fn from_config(cfg: &Config) -> Arc<dyn Cache> {
    if !cfg.cache.active {
        return Arc::new(NullCache);
    }

    match cfg.cache.provider.as_str() {
        "inmemory" => Arc::new(InMemoryCache::new(cfg.cache.inmemory.size)),
        "redis" => match RedisCache::connect(&cfg.cache.redis).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!("Redis cache unavailable, falling back to null cache: {}", e);
                Arc::new(NullCache)
            }
        },
        "" | "null" => Arc::new(NullCache),
        other => {
            warn!("Unknown cache provider '{}', using null cache", other);
            Arc::new(NullCache)
        }
    }
}
