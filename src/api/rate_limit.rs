//! Per-IP rate limiting middleware
//!
//! Fixed-window counter per client address. Exceeding the configured
//! request count inside the window returns 429.

use crate::config::RateLimitConfig;
use crate::error::Error;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

/// Entries above this count trigger a sweep of expired windows
const PRUNE_THRESHOLD: usize = 16 * 1024;

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> RateLimiter {
        RateLimiter {
            max_requests: cfg.max_requests,
            window: Duration::from_secs(cfg.window_sec),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for the address; `false` when over the limit
    pub fn allow(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, (start, _)| now.duration_since(*start) < window);
        }

        let entry = windows.entry(ip).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }

        if entry.1 >= self.max_requests {
            return false;
        }

        entry.1 += 1;
        true
    }
}

/// Axum middleware wrapping every routed request
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.allow(ip) {
        warn!("Rate limit exceeded for {}", ip);
        return Error::RateLimited.into_response();
    }

    next.run(request).await
}
