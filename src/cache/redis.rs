//! Redis-backed cache backend
//!
//! Values are stored as JSON strings. Every write also records the key in a
//! `cache_access` sorted set scored by insertion time; when `maxLRUSize` is
//! non-negative the set is trimmed down to that size. A `maxLRUSize` of -1
//! leaves the set unbounded.

use super::Cache;
use crate::config::RedisCacheConfig;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

const ACCESS_SET_KEY: &str = "cache_access";

pub struct RedisCache {
    conn: ConnectionManager,
    max_lru_size: i64,
}

impl RedisCache {
    /// Connects to the configured Redis instance. Fails when the server is
    /// unreachable; the caller decides on the fallback.
    pub async fn connect(cfg: &RedisCacheConfig) -> redis::RedisResult<Self> {
        let url = if cfg.password.is_empty() {
            format!("redis://{}:{}/{}", cfg.host, cfg.port, cfg.db)
        } else {
            format!("redis://:{}@{}:{}/{}", cfg.password, cfg.host, cfg.port, cfg.db)
        };

        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;

        Ok(RedisCache {
            conn,
            max_lru_size: cfg.max_lru_size,
        })
    }

    fn now_score() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn contains(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.exists::<_, bool>(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Redis EXISTS failed for '{}': {}", key, e);
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut conn = self.conn.clone();
        let raw: String = match conn.get(key).await {
            Ok(v) => v,
            Err(_) => return None,
        };

        let value = serde_json::from_str(&raw).ok()?;

        // Bump the access score to keep recently used keys out of the trim
        if let Err(e) = conn.zincr::<_, _, _, ()>(ACCESS_SET_KEY, key, 1).await {
            warn!("Redis ZINCRBY failed for '{}': {}", key, e);
        }

        Some(value)
    }

    async fn set(&self, key: &str, value: serde_json::Value) {
        let raw = match serde_json::to_string(&value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache value for '{}': {}", key, e);
                return;
            }
        };

        let mut conn = self.conn.clone();
        if let Err(e) = conn.set::<_, _, ()>(key, raw).await {
            warn!("Redis SET failed for '{}': {}", key, e);
            return;
        }

        if let Err(e) = conn
            .zadd::<_, _, _, ()>(ACCESS_SET_KEY, key, Self::now_score())
            .await
        {
            warn!("Redis ZADD failed for '{}': {}", key, e);
        }

        if self.max_lru_size >= 0 {
            let count: i64 = match conn.zcard(ACCESS_SET_KEY).await {
                Ok(count) => count,
                Err(_) => return,
            };
            if count > self.max_lru_size {
                let to_remove = count - self.max_lru_size;
                if let Err(e) = conn
                    .zpopmin::<_, ()>(ACCESS_SET_KEY, to_remove as isize)
                    .await
                {
                    warn!("Redis ZPOPMIN failed: {}", e);
                }
            }
        }
    }

    async fn clear(&self) {
        let mut conn = self.conn.clone();
        if let Err(e) = redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await {
            warn!("Redis FLUSHDB failed: {}", e);
        }
    }
}
