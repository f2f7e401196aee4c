//! HTTP server setup and routing
//!
//! Builds the Axum router from the configured path bindings and carries the
//! process-wide context (config, registries, cache) into every handler.

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::face::DetectorRegistry;
use crate::fetchers::{Fetcher, FetcherRegistry};
use crate::manipulators::ManipulatorRegistry;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use super::rate_limit::{self, RateLimiter};

/// One configured path with its resolved fetcher
pub struct PathBinding {
    pub path: String,
    pub fetcher: Option<Arc<dyn Fetcher>>,
    pub cache_control: Option<String>,
}

/// Shared application context passed to all handlers. Everything in here
/// is immutable after startup; the cache synchronizes internally.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub fetchers: Arc<FetcherRegistry>,
    pub manipulators: Arc<ManipulatorRegistry>,
    pub detectors: Arc<DetectorRegistry>,
    pub cache: Arc<dyn Cache>,
    pub paths: Arc<Vec<PathBinding>>,
    /// Shared client for secondary fetches (paste)
    pub http: reqwest::Client,
}

impl AppContext {
    /// Builds all registries and the cache from the loaded configuration
    pub async fn from_config(config: Config) -> AppContext {
        let fetchers = Arc::new(FetcherRegistry::from_config(&config));
        let cache = crate::cache::from_config(&config).await;
        let http_timeout = Duration::from_secs(config.server.http_timeout);

        let paths: Vec<PathBinding> = config
            .paths
            .iter()
            .map(|p| {
                let fetcher = fetchers.by_name(&p.fetcher_name);
                if fetcher.is_none() {
                    warn!(
                        "Path '{}' references unknown fetcher '{}'",
                        p.path, p.fetcher_name
                    );
                }
                PathBinding {
                    path: p.path.clone(),
                    fetcher,
                    cache_control: p.cache_control.clone(),
                }
            })
            .collect();

        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .expect("failed to build HTTP client");

        AppContext {
            config: Arc::new(config),
            fetchers,
            manipulators: Arc::new(ManipulatorRegistry::new()),
            detectors: Arc::new(DetectorRegistry::new(http_timeout)),
            cache,
            paths: Arc::new(paths),
            http,
        }
    }

    /// Binding lookup: exact match first, then the longest binding whose
    /// path covers the request path as a directory prefix.
    pub fn binding_for(&self, path: &str) -> Option<&PathBinding> {
        if let Some(binding) = self.paths.iter().find(|b| b.path == path) {
            return Some(binding);
        }

        self.paths
            .iter()
            .filter(|b| {
                let prefix = if b.path.ends_with('/') {
                    b.path.clone()
                } else {
                    format!("{}/", b.path)
                };
                path.starts_with(&prefix)
            })
            .max_by_key(|b| b.path.len())
    }
}

/// Builds the router with all configured image routes
pub fn create_router(ctx: AppContext) -> Router {
    let mut app = Router::new().route("/health", get(super::handlers::health));

    for binding in ctx.paths.iter() {
        if binding.path.contains(":url") {
            app = app.route(&binding.path, get(super::handlers::handle_image));
        } else {
            app = app
                .route(
                    &format!("{}/:url", binding.path),
                    get(super::handlers::handle_image),
                )
                .route(
                    &format!("{}/:url/*pipeline", binding.path),
                    get(super::handlers::handle_image),
                );
        }
    }

    // Request deadline: read plus write timeout
    let deadline =
        Duration::from_secs(ctx.config.server.read_timeout + ctx.config.server.write_timeout);

    let mut app = app
        .layer(TimeoutLayer::new(deadline))
        .layer(DefaultBodyLimit::max(ctx.config.server.max_request_size as usize));

    if ctx.config.server.rate_limit.enabled {
        let limiter = Arc::new(RateLimiter::new(&ctx.config.server.rate_limit));
        info!(
            "Rate limiting enabled: {} requests per {}s",
            ctx.config.server.rate_limit.max_requests, ctx.config.server.rate_limit.window_sec
        );
        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit::rate_limit,
        ));
    }

    app.with_state(ctx)
}

/// Runs the HTTP server until shutdown
pub async fn run(ctx: AppContext, host: &str, port: u16) -> Result<()> {
    let app = create_router(ctx);

    let addr = format!("{}:{}", host, port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Config(format!("failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| Error::Config(format!("server error: {}", e)))?;

    Ok(())
}
