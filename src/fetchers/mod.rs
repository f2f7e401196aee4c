//! Source fetchers
//!
//! A fetcher resolves a source locator to raw image bytes plus the
//! best-known content type. Fetchers are constructed once from the
//! configured descriptor list and shared, immutable, across all requests.

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

mod cloud;
mod http;
mod local;
pub mod ssrf;

pub use cloud::ObjectStoreFetcher;
pub use http::HttpFetcher;
pub use local::LocalFetcher;

/// Fetched source bytes and the upstream's content type (empty when
/// unknown; the codec falls back to extension inference).
#[derive(Debug)]
pub struct FetchedImage {
    pub body: Bytes,
    pub content_type: String,
}

/// Handles fetching content from one kind of source
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The configured name, referenced by path bindings
    fn name(&self) -> &str;

    /// The `type` tag this implementation registers under
    fn fetcher_type(&self) -> &str;

    /// Fetches the locator. `Ok(None)` means the source has no body (404);
    /// errors surface as fetch failures (500).
    async fn fetch(&self, url: &str) -> Result<Option<FetchedImage>>;
}

/// Immutable registry of configured fetchers, keyed by name and by type
pub struct FetcherRegistry {
    by_name: HashMap<String, Arc<dyn Fetcher>>,
    by_type: HashMap<String, Arc<dyn Fetcher>>,
}

impl FetcherRegistry {
    /// Builds all configured fetchers. Entries with an unknown `type` tag
    /// are skipped with a warning, not fatal.
    pub fn from_config(cfg: &Config) -> FetcherRegistry {
        let mut by_name: HashMap<String, Arc<dyn Fetcher>> = HashMap::new();
        let mut by_type: HashMap<String, Arc<dyn Fetcher>> = HashMap::new();

        for fetcher_cfg in &cfg.fetchers {
            let fetcher: Arc<dyn Fetcher> = match fetcher_cfg.fetcher_type.as_str() {
                "local" => Arc::new(LocalFetcher::new(fetcher_cfg, &cfg.server)),
                "http" => Arc::new(HttpFetcher::new(fetcher_cfg, &cfg.server)),
                "s3" | "gs" | "ds" | "r2" | "as" => {
                    Arc::new(ObjectStoreFetcher::new(fetcher_cfg))
                }
                other => {
                    warn!("Skipping fetcher '{}' with unknown type '{}'", fetcher_cfg.name, other);
                    continue;
                }
            };

            by_type.insert(fetcher.fetcher_type().to_string(), Arc::clone(&fetcher));
            by_name.insert(fetcher.name().to_string(), fetcher);
        }

        FetcherRegistry { by_name, by_type }
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Fetcher>> {
        self.by_name.get(name).cloned()
    }

    pub fn by_type(&self, fetcher_type: &str) -> Option<Arc<dyn Fetcher>> {
        self.by_type.get(fetcher_type).cloned()
    }
}
