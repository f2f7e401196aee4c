//! Local filesystem fetcher

use super::{FetchedImage, Fetcher};
use crate::config::{FetcherConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::mime::mime_type_by_file_ext;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Fetches content from files under a fixed root directory. Any locator
/// whose cleaned path would escape the root is rejected.
pub struct LocalFetcher {
    name: String,
    root: PathBuf,
    max_image_size_bytes: u64,
}

impl LocalFetcher {
    pub fn new(cfg: &FetcherConfig, server: &ServerConfig) -> LocalFetcher {
        LocalFetcher {
            name: cfg.name.clone(),
            root: PathBuf::from(cfg.get_str("path")),
            max_image_size_bytes: server.max_image_size_bytes,
        }
    }

    /// Resolves the locator against the root, rejecting traversal attempts.
    fn resolve(&self, url: &str) -> Result<PathBuf> {
        let filename = url.strip_prefix("local://").unwrap_or(url);

        let relative = Path::new(filename);
        let mut cleaned = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => cleaned.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::Fetch(format!(
                        "path traversal attempt detected: {}",
                        filename
                    )));
                }
            }
        }

        let full = self.root.join(&cleaned);

        // Double-check the joined path stayed within the root
        if !full.starts_with(&self.root) {
            return Err(Error::Fetch(format!(
                "path traversal attempt detected: {}",
                filename
            )));
        }

        Ok(full)
    }
}

#[async_trait]
impl Fetcher for LocalFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetcher_type(&self) -> &str {
        "local"
    }

    async fn fetch(&self, url: &str) -> Result<Option<FetchedImage>> {
        let full_path = self.resolve(url)?;
        debug!("Loading local file {}", full_path.display());

        // Check the size before reading to avoid memory exhaustion
        let meta = tokio::fs::metadata(&full_path)
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", full_path.display(), e)))?;
        if meta.len() > self.max_image_size_bytes {
            return Err(Error::Fetch(format!(
                "file size ({} bytes) exceeds maximum allowed size ({} bytes)",
                meta.len(),
                self.max_image_size_bytes
            )));
        }

        let buf = tokio::fs::read(&full_path)
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", full_path.display(), e)))?;

        let content_type = mime_type_by_file_ext(url);
        debug!("Determined content type '{}' for {}", content_type, url);

        Ok(Some(FetchedImage {
            body: buf.into(),
            content_type: content_type.to_string(),
        }))
    }
}
