//! HTTP/HTTPS fetcher
//!
//! Outbound GETs run inside a safety envelope: SSRF destination checks,
//! optional host and path allowlists, a Content-Length pre-check and a
//! length-limited body read. Compressed response bodies (gzip, brotli,
//! zstd, deflate) are advertised and transparently decoded by the client.

use super::ssrf;
use super::{FetchedImage, Fetcher};
use crate::config::{FetcherConfig, ServerConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct HttpFetcher {
    name: String,
    client: reqwest::Client,

    username: String,
    password: String,

    restrict_hosts: Vec<String>,
    restrict_paths: Vec<String>,
    disable_ssrf_protection: bool,

    max_image_size_bytes: u64,
}

impl HttpFetcher {
    pub fn new(cfg: &FetcherConfig, server: &ServerConfig) -> HttpFetcher {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.http_timeout))
            .build()
            .expect("failed to build HTTP client");

        HttpFetcher {
            name: cfg.name.clone(),
            client,
            username: cfg.get_str("username"),
            password: cfg.get_str("password"),
            restrict_hosts: cfg.get_str_list("restrictHosts"),
            restrict_paths: cfg.get_str_list("restrictPaths"),
            disable_ssrf_protection: cfg.get_bool("disableSSRFProtection"),
            max_image_size_bytes: server.max_image_size_bytes,
        }
    }

    fn check_restrictions(&self, url: &Url) -> Result<()> {
        if !self.restrict_hosts.is_empty() {
            let host = url.host_str().unwrap_or_default();
            let allowed = self.restrict_hosts.iter().any(|allowed_host| {
                host == allowed_host || host.ends_with(&format!(".{}", allowed_host))
            });
            if !allowed {
                return Err(Error::Fetch(format!(
                    "host {} is not in allowed hosts list",
                    host
                )));
            }
        }

        if !self.restrict_paths.is_empty() {
            let path = url.path();
            if !self.restrict_paths.iter().any(|p| path.starts_with(p.as_str())) {
                return Err(Error::Fetch(format!(
                    "path {} is not in allowed paths list",
                    path
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetcher_type(&self) -> &str {
        "http"
    }

    async fn fetch(&self, fetch_url: &str) -> Result<Option<FetchedImage>> {
        let url = Url::parse(fetch_url)
            .map_err(|e| Error::Fetch(format!("invalid URL: {}", e)))?;

        if !self.disable_ssrf_protection {
            ssrf::check_url(&url).await?;
        }

        self.check_restrictions(&url)?;

        let mut request = self.client.get(url);
        if !self.username.is_empty() || !self.password.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP error: {}", status)));
        }

        // Reject on the advertised length before reading the body
        if let Some(length) = response.content_length() {
            if length > self.max_image_size_bytes {
                return Err(Error::Fetch(format!(
                    "image size ({} bytes) exceeds maximum allowed size ({} bytes)",
                    length, self.max_image_size_bytes
                )));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // Length-limited read; the advertised length can lie (or be absent
        // entirely for compressed bodies)
        let mut body = BytesMut::new();
        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Fetch(format!("read failed: {}", e)))?
        {
            if body.len() as u64 + chunk.len() as u64 > self.max_image_size_bytes {
                return Err(Error::Fetch(format!(
                    "image size exceeds maximum allowed size ({} bytes)",
                    self.max_image_size_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes, Content-Type={}", body.len(), content_type);

        Ok(Some(FetchedImage {
            body: body.freeze(),
            content_type,
        }))
    }
}
