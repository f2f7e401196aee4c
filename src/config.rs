//! Configuration loading
//!
//! The configuration is a single YAML document loaded once at startup. The
//! raw file body is subjected to `$NAME` environment-variable expansion
//! before parsing, and the server limits can additionally be overridden by
//! `THUMBLA_*` environment variables after parsing. Invalid override values
//! are ignored, never fatal. Nothing here mutates after startup.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Top-level server configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Log verbosity tag (debug/info/warn/error/off)
    #[serde(rename = "debugLevel", default)]
    pub debug_level: String,

    /// Default Cache-Control header value
    #[serde(rename = "cacheControlHeader", default)]
    pub cache_control_header: String,

    /// Fetcher descriptors; each must carry `name` and `type` tags
    #[serde(default)]
    pub fetchers: Vec<FetcherConfig>,

    /// Path bindings, in declaration order
    #[serde(default)]
    pub paths: Vec<PathConfig>,

    #[serde(default)]
    pub faceapi: FaceApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// One fetcher descriptor. Only `name` and `type` are common; everything
/// else is backend-specific and read by the matching constructor.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FetcherConfig {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub fetcher_type: String,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl FetcherConfig {
    /// Backend-specific string field, empty when absent or not a string
    pub fn get_str(&self, key: &str) -> String {
        self.extra
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Backend-specific boolean field, `false` when absent
    pub fn get_bool(&self, key: &str) -> bool {
        self.extra.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Backend-specific string-list field, empty when absent
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.extra
            .get(key)
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One path binding
#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    pub path: String,

    #[serde(rename = "fetcherName")]
    pub fetcher_name: String,

    #[serde(rename = "cacheControl", default)]
    pub cache_control: Option<String>,
}

/// Face detection provider configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FaceApiConfig {
    #[serde(rename = "defaultProvider", default)]
    pub default_provider: String,

    #[serde(rename = "microsoftFaceAPI", default)]
    pub microsoft_face_api: MicrosoftFaceApiConfig,

    #[serde(rename = "googleCloudVisionAPI", default)]
    pub google_cloud_vision_api: GoogleCloudVisionApiConfig,

    #[serde(rename = "awsRekognition", default)]
    pub aws_rekognition: AwsRekognitionConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MicrosoftFaceApiConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GoogleCloudVisionApiConfig {
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AwsRekognitionConfig {
    #[serde(default)]
    pub region: String,
}

/// Cache backend selection
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub provider: String,

    #[serde(default)]
    pub inmemory: InMemoryCacheConfig,

    #[serde(default)]
    pub redis: RedisCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            active: true,
            provider: String::new(),
            inmemory: InMemoryCacheConfig::default(),
            redis: RedisCacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InMemoryCacheConfig {
    #[serde(default = "default_inmemory_size")]
    pub size: usize,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        InMemoryCacheConfig {
            size: default_inmemory_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisCacheConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,

    #[serde(default = "default_redis_port")]
    pub port: u16,

    #[serde(default)]
    pub db: i64,

    #[serde(default)]
    pub password: String,

    /// -1 disables trimming of the access set (unbounded by design)
    #[serde(rename = "maxLRUSize", default = "default_max_lru_size")]
    pub max_lru_size: i64,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        RedisCacheConfig {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            password: String::new(),
            max_lru_size: default_max_lru_size(),
        }
    }
}

/// Server resource caps
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Maximum HTTP request size in bytes
    #[serde(rename = "maxRequestSize", default = "default_max_request_size")]
    pub max_request_size: u64,

    /// Read timeout in seconds
    #[serde(rename = "readTimeout", default = "default_timeout_secs")]
    pub read_timeout: u64,

    /// Write timeout in seconds
    #[serde(rename = "writeTimeout", default = "default_timeout_secs")]
    pub write_timeout: u64,

    /// Outbound HTTP timeout in seconds
    #[serde(rename = "httpTimeout", default = "default_timeout_secs")]
    pub http_timeout: u64,

    /// Maximum image pixel dimension per side
    #[serde(rename = "maxImageDimension", default = "default_max_image_dimension")]
    pub max_image_dimension: u32,

    /// Maximum image byte size
    #[serde(rename = "maxImageSizeBytes", default = "default_max_image_size_bytes")]
    pub max_image_size_bytes: u64,

    #[serde(rename = "rateLimit", default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            max_request_size: default_max_request_size(),
            read_timeout: default_timeout_secs(),
            write_timeout: default_timeout_secs(),
            http_timeout: default_timeout_secs(),
            max_image_dimension: default_max_image_dimension(),
            max_image_size_bytes: default_max_image_size_bytes(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(rename = "maxRequests", default = "default_rate_limit_max")]
    pub max_requests: u32,

    #[serde(rename = "windowSec", default = "default_rate_limit_window")]
    pub window_sec: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            enabled: true,
            max_requests: default_rate_limit_max(),
            window_sec: default_rate_limit_window(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_inmemory_size() -> usize {
    128
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_max_lru_size() -> i64 {
    -1
}

fn default_max_request_size() -> u64 {
    100 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_image_dimension() -> u32 {
    10_000
}

fn default_max_image_size_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_rate_limit_max() -> u32 {
    1000
}

fn default_rate_limit_window() -> u64 {
    60
}

impl Config {
    /// Load the config file, expanding `$NAME` references in the raw body
    /// before YAML parsing and applying `THUMBLA_*` overrides afterwards.
    pub fn load(config_file: &Path) -> Result<Config> {
        let data = std::fs::read_to_string(config_file).map_err(|e| {
            Error::Config(format!(
                "failed to read config file {}: {}",
                config_file.display(),
                e
            ))
        })?;

        let expanded = expand_env(&data);

        let mut cfg: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("failed to parse YAML: {}", e)))?;

        cfg.server.apply_env_overrides();

        Ok(cfg)
    }

    /// Path binding lookup: exact match first, then the longest binding
    /// whose path, taken as a directory prefix, covers the request path.
    pub fn path_config_by_path(&self, request_path: &str) -> Option<&PathConfig> {
        if let Some(p) = self.paths.iter().find(|p| p.path == request_path) {
            return Some(p);
        }

        self.paths
            .iter()
            .filter(|p| {
                let prefix = if p.path.ends_with('/') {
                    p.path.clone()
                } else {
                    format!("{}/", p.path)
                };
                request_path.starts_with(&prefix)
            })
            .max_by_key(|p| p.path.len())
    }
}

impl ServerConfig {
    /// Apply `THUMBLA_*` environment overrides. Unset or unparsable
    /// variables leave the configured value untouched.
    fn apply_env_overrides(&mut self) {
        override_from_env("THUMBLA_MAX_REQUEST_SIZE", &mut self.max_request_size);
        override_from_env("THUMBLA_READ_TIMEOUT", &mut self.read_timeout);
        override_from_env("THUMBLA_WRITE_TIMEOUT", &mut self.write_timeout);
        override_from_env("THUMBLA_HTTP_TIMEOUT", &mut self.http_timeout);
        override_from_env("THUMBLA_MAX_IMAGE_DIMENSION", &mut self.max_image_dimension);
        override_from_env("THUMBLA_MAX_IMAGE_SIZE", &mut self.max_image_size_bytes);
        override_from_env("THUMBLA_RATE_LIMIT_ENABLED", &mut self.rate_limit.enabled);
        override_from_env("THUMBLA_RATE_LIMIT_MAX", &mut self.rate_limit.max_requests);
        override_from_env("THUMBLA_RATE_LIMIT_WINDOW", &mut self.rate_limit.window_sec);
    }
}

fn override_from_env<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => warn!("Ignoring invalid value for {}: {:?}", var, raw),
        }
    }
}

/// Expand `$NAME` and `${NAME}` references against the process environment.
/// Unset variables expand to the empty string.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let braced = matches!(chars.peek(), Some((_, '{')));
        if braced {
            chars.next();
        }

        let mut name = String::new();
        while let Some(&(_, nc)) = chars.peek() {
            let valid = if name.is_empty() {
                nc.is_ascii_alphabetic() || nc == '_'
            } else {
                nc.is_ascii_alphanumeric() || nc == '_'
            };
            if !valid {
                break;
            }
            name.push(nc);
            chars.next();
        }

        if braced {
            if matches!(chars.peek(), Some((_, '}'))) {
                chars.next();
            } else {
                // Unterminated ${ — emit literally
                out.push('$');
                out.push('{');
                out.push_str(&name);
                continue;
            }
        }

        if name.is_empty() {
            out.push('$');
            continue;
        }

        if let Ok(value) = std::env::var(&name) {
            out.push_str(&value);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_server_defaults() {
        let cfg = parse("debugLevel: info");
        assert_eq!(cfg.server.max_request_size, 100 * 1024 * 1024);
        assert_eq!(cfg.server.read_timeout, 30);
        assert_eq!(cfg.server.write_timeout, 30);
        assert_eq!(cfg.server.http_timeout, 30);
        assert_eq!(cfg.server.max_image_dimension, 10_000);
        assert_eq!(cfg.server.max_image_size_bytes, 50 * 1024 * 1024);
        assert!(cfg.server.rate_limit.enabled);
        assert_eq!(cfg.server.rate_limit.max_requests, 1000);
        assert_eq!(cfg.server.rate_limit.window_sec, 60);
    }

    #[test]
    fn test_fetcher_extra_fields() {
        let cfg = parse(
            r#"
fetchers:
  - name: pics
    type: http
    secure: true
    restrictHosts:
      - example.com
      - cdn.example.com
"#,
        );
        let f = &cfg.fetchers[0];
        assert_eq!(f.name, "pics");
        assert_eq!(f.fetcher_type, "http");
        assert!(f.get_bool("secure"));
        assert_eq!(
            f.get_str_list("restrictHosts"),
            vec!["example.com", "cdn.example.com"]
        );
        assert_eq!(f.get_str("missing"), "");
    }

    #[test]
    fn test_path_lookup_exact_then_prefix() {
        let cfg = parse(
            r#"
paths:
  - path: /i/local
    fetcherName: local
  - path: /i
    fetcherName: other
"#,
        );
        assert_eq!(
            cfg.path_config_by_path("/i/local").unwrap().fetcher_name,
            "local"
        );
        // Longest directory prefix wins for non-exact paths
        assert_eq!(
            cfg.path_config_by_path("/i/local/extra").unwrap().fetcher_name,
            "local"
        );
        assert_eq!(cfg.path_config_by_path("/i/other").unwrap().fetcher_name, "other");
        assert!(cfg.path_config_by_path("/unknown").is_none());
    }

    #[test]
    fn test_cache_config_defaults() {
        let cfg = parse("cache:\n  provider: redis");
        assert!(cfg.cache.active);
        assert_eq!(cfg.cache.redis.host, "127.0.0.1");
        assert_eq!(cfg.cache.redis.port, 6379);
        assert_eq!(cfg.cache.redis.max_lru_size, -1);
    }

    #[test]
    #[serial]
    fn test_expand_env() {
        std::env::set_var("THUMBLA_TEST_BUCKET", "my-bucket");
        assert_eq!(
            expand_env("bucket: $THUMBLA_TEST_BUCKET"),
            "bucket: my-bucket"
        );
        assert_eq!(
            expand_env("bucket: ${THUMBLA_TEST_BUCKET}!"),
            "bucket: my-bucket!"
        );
        assert_eq!(expand_env("plain text"), "plain text");
        assert_eq!(expand_env("cost: $99"), "cost: $99");
        std::env::remove_var("THUMBLA_TEST_BUCKET");
        assert_eq!(expand_env("x: $THUMBLA_TEST_BUCKET."), "x: .");
    }

    #[test]
    #[serial]
    fn test_env_override_applied() {
        std::env::set_var("THUMBLA_MAX_IMAGE_DIMENSION", "500");
        let mut server = ServerConfig::default();
        server.apply_env_overrides();
        assert_eq!(server.max_image_dimension, 500);
        std::env::remove_var("THUMBLA_MAX_IMAGE_DIMENSION");
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_ignored() {
        std::env::set_var("THUMBLA_MAX_IMAGE_DIMENSION", "not-a-number");
        let mut server = ServerConfig::default();
        server.apply_env_overrides();
        assert_eq!(server.max_image_dimension, 10_000);
        std::env::remove_var("THUMBLA_MAX_IMAGE_DIMENSION");
    }
}
