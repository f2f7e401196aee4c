//! Object-store fetchers (S3, Google Cloud Storage, Azure Blob,
//! DigitalOcean Spaces, Cloudflare R2)
//!
//! All five backends go through the `object_store` crate; the differences
//! are confined to locator parsing and client construction. Locators are
//! either scheme-qualified URLs (`s3://…`, `gs://…`) or keys relative to
//! the configured bucket. A missing object maps to "no body" (404 at the
//! orchestrator); every other failure is a fetch error.

use super::{FetchedImage, Fetcher};
use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as StorePath;
use object_store::{Attribute, ObjectStore};
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub struct ObjectStoreFetcher {
    name: String,
    fetcher_type: String,

    region: String,
    access_key_id: String,
    secret_access_key: String,
    bucket: String,
    path_prefix: String,

    /// Spaces: explicit endpoint; R2: derived from the account id
    endpoint: String,
    account_id: String,

    /// GCS: `securitySource: file` + service account JSON path
    security_source: String,
    service_account_json_file: String,

    /// Azure: storage account name, key and container
    account_name: String,
    account_key: String,
    container: String,
}

impl ObjectStoreFetcher {
    pub fn new(cfg: &FetcherConfig) -> ObjectStoreFetcher {
        ObjectStoreFetcher {
            name: cfg.name.clone(),
            fetcher_type: cfg.fetcher_type.clone(),
            region: cfg.get_str("region"),
            access_key_id: cfg.get_str("accessKeyId"),
            secret_access_key: cfg.get_str("secretAccessKey"),
            bucket: cfg.get_str("bucket"),
            path_prefix: cfg.get_str("path"),
            endpoint: cfg.get_str("endpoint"),
            account_id: cfg.get_str("accountId"),
            security_source: cfg.get_str("securitySource"),
            service_account_json_file: cfg.get_str("serviceAccountJSONFile"),
            account_name: cfg.get_str("accountName"),
            account_key: cfg.get_str("accountKey"),
            container: cfg.get_str("container"),
        }
    }

    /// Splits the locator into bucket, object key and (for S3 URL-style
    /// locators) a region parsed from the host.
    fn resolve_target(&self, url: &str) -> Result<(String, String, String)> {
        match self.fetcher_type.as_str() {
            "s3" => {
                if let Some((region, bucket, key)) = parse_s3_url(url) {
                    let region = if region.is_empty() {
                        debug!("No region found in URL, using default '{}'", self.region);
                        self.region.clone()
                    } else {
                        debug!("Found region in URL '{}'", region);
                        region
                    };
                    return Ok((bucket, key, region));
                }
                self.relative_target(url)
            }
            "gs" => {
                if let Ok(parsed) = Url::parse(url) {
                    if parsed.scheme() == "gs" {
                        let bucket = parsed.host_str().unwrap_or_default().to_string();
                        let key = parsed.path().trim_start_matches('/').to_string();
                        if !bucket.is_empty() && !key.is_empty() {
                            return Ok((bucket, key, String::new()));
                        }
                    }
                }
                self.relative_target(url)
            }
            _ => self.relative_target(url),
        }
    }

    fn relative_target(&self, url: &str) -> Result<(String, String, String)> {
        let bucket = if self.fetcher_type == "as" {
            self.container.clone()
        } else {
            self.bucket.clone()
        };
        if bucket.is_empty() {
            return Err(Error::Fetch(format!(
                "failed to parse file URL '{}': no bucket configured",
                url
            )));
        }

        let key = if self.path_prefix.is_empty() {
            url.trim_start_matches('/').to_string()
        } else {
            format!(
                "{}/{}",
                self.path_prefix.trim_matches('/'),
                url.trim_start_matches('/')
            )
        };

        Ok((bucket, key, self.region.clone()))
    }

    fn build_store(&self, bucket: &str, region: &str) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match self.fetcher_type.as_str() {
            "s3" | "ds" | "r2" => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_access_key_id(&self.access_key_id)
                    .with_secret_access_key(&self.secret_access_key);

                builder = match self.fetcher_type.as_str() {
                    "ds" => builder
                        .with_region(if region.is_empty() { "us-east-1" } else { region })
                        .with_endpoint(&self.endpoint),
                    "r2" => builder.with_region("auto").with_endpoint(format!(
                        "https://{}.r2.cloudflarestorage.com",
                        self.account_id
                    )),
                    _ => builder.with_region(region),
                };

                Arc::new(
                    builder
                        .build()
                        .map_err(|e| Error::Fetch(format!("failed to build S3 client: {}", e)))?,
                )
            }
            "gs" => {
                let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);
                if self.security_source == "file" && !self.service_account_json_file.is_empty() {
                    builder = builder.with_service_account_path(&self.service_account_json_file);
                }
                Arc::new(builder.build().map_err(|e| {
                    Error::Fetch(format!("failed to build GCS client: {}", e))
                })?)
            }
            "as" => Arc::new(
                MicrosoftAzureBuilder::new()
                    .with_account(&self.account_name)
                    .with_access_key(&self.account_key)
                    .with_container_name(bucket)
                    .build()
                    .map_err(|e| Error::Fetch(format!("failed to build Azure client: {}", e)))?,
            ),
            other => {
                return Err(Error::Fetch(format!("unsupported store type '{}'", other)));
            }
        };

        Ok(store)
    }
}

#[async_trait]
impl Fetcher for ObjectStoreFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetcher_type(&self) -> &str {
        &self.fetcher_type
    }

    async fn fetch(&self, url: &str) -> Result<Option<FetchedImage>> {
        let (bucket, key, region) = self.resolve_target(url)?;
        debug!(
            "Fetching from {}: bucket={} key={} region={}",
            self.fetcher_type, bucket, key, region
        );

        let store = self.build_store(&bucket, &region)?;

        let result = match store.get(&StorePath::from(key.as_str())).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(Error::Fetch(format!("failed to get object: {}", e))),
        };

        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.as_ref().to_string())
            .unwrap_or_default();

        let body = result
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read object: {}", e)))?;

        debug!("Content length: {}  Content-Type: {}", body.len(), content_type);

        Ok(Some(FetchedImage { body, content_type }))
    }
}

/// Parses `http(s)://s3-<region>.amazonaws.com/bucket/key` style locators.
/// Returns (region, bucket, key); the region is empty when the host names
/// no region.
fn parse_s3_url(url: &str) -> Option<(String, String, String)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if !host.ends_with(".amazonaws.com") {
        return None;
    }

    let subdomain = host.trim_end_matches(".amazonaws.com");
    let region = subdomain
        .strip_prefix("s3-")
        .or_else(|| subdomain.strip_prefix("s3."))
        .unwrap_or("")
        .to_string();

    let mut segments = parsed.path().trim_start_matches('/').splitn(2, '/');
    let bucket = segments.next()?.to_string();
    let key = segments.next()?.to_string();
    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    Some((region, bucket, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_url_with_region() {
        let (region, bucket, key) =
            parse_s3_url("http://s3-us-west-2.amazonaws.com/mybucket/path/file.jpg").unwrap();
        assert_eq!(region, "us-west-2");
        assert_eq!(bucket, "mybucket");
        assert_eq!(key, "path/file.jpg");
    }

    #[test]
    fn test_parse_s3_url_without_region() {
        let (region, bucket, key) =
            parse_s3_url("s3://s3.amazonaws.com/mybucket/file.jpg").unwrap();
        assert_eq!(region, "");
        assert_eq!(bucket, "mybucket");
        assert_eq!(key, "file.jpg");
    }

    #[test]
    fn test_parse_s3_url_rejects_short_paths() {
        assert!(parse_s3_url("http://s3.amazonaws.com/bucketonly").is_none());
        assert!(parse_s3_url("http://example.com/bucket/key").is_none());
        assert!(parse_s3_url("not-a-url").is_none());
    }

    fn fetcher_from_yaml(yaml: &str) -> ObjectStoreFetcher {
        ObjectStoreFetcher::new(&serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_relative_key_joined_with_prefix() {
        let fetcher = fetcher_from_yaml(
            "name: pics\ntype: s3\nbucket: assets\npath: thumbs\nregion: eu-west-1\n",
        );
        let (bucket, key, region) = fetcher.resolve_target("a/b.jpg").unwrap();
        assert_eq!(bucket, "assets");
        assert_eq!(key, "thumbs/a/b.jpg");
        assert_eq!(region, "eu-west-1");
    }

    #[test]
    fn test_gs_url_form() {
        let fetcher = fetcher_from_yaml("name: g\ntype: gs\nbucket: fallback\n");
        let (bucket, key, _) = fetcher.resolve_target("gs://media/img/x.png").unwrap();
        assert_eq!(bucket, "media");
        assert_eq!(key, "img/x.png");
    }

    #[test]
    fn test_azure_uses_container() {
        let fetcher = fetcher_from_yaml(
            "name: az\ntype: as\naccountName: acct\naccountKey: k\ncontainer: imgs\n",
        );
        let (bucket, key, _) = fetcher.resolve_target("photo.jpg").unwrap();
        assert_eq!(bucket, "imgs");
        assert_eq!(key, "photo.jpg");
    }

    #[test]
    fn test_missing_bucket_is_error() {
        let fetcher = fetcher_from_yaml("name: s\ntype: ds\n");
        assert!(fetcher.resolve_target("x.jpg").is_err());
    }
}
