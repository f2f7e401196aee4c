//! HTTP request handlers
//!
//! `handle_image` is the request orchestrator: it matches the path binding,
//! decodes the locator, fetches and decodes the source, runs the pipeline
//! and encodes the result with the negotiated content type and caching
//! headers.

use super::server::AppContext;
use crate::codec::{self, EncodeOptions};
use crate::error::{Error, Result};
use crate::manipulators::{parse_pipeline, ManipulatorContext};
use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use image::DynamicImage;
use percent_encoding::percent_decode_str;
use tracing::debug;

/// GET /health - health check endpoint
pub async fn health() -> &'static str {
    "All is well"
}

/// The locator may carry a `|p1,p2,…` suffix with file parameters
fn split_file_params(image_url: &str) -> (String, Vec<String>) {
    match image_url.split_once('|') {
        Some((url, params)) => (
            url.to_string(),
            params.split(',').map(str::to_string).collect(),
        ),
        None => (image_url.to_string(), Vec::new()),
    }
}

/// What the locator classification decided about the source
enum Source {
    /// Fetch through the bound fetcher, optionally rasterizing SVG at the
    /// given dimensions
    Fetch {
        alt_width: Option<u32>,
        alt_height: Option<u32>,
    },
    /// Freshly created transparent image; no fetch at all
    Blank(DynamicImage),
}

fn classify_source(
    locator: &str,
    params: &[String],
    max_dimension: u32,
) -> Result<Source> {
    if locator.to_lowercase().ends_with(".svg") && !params.is_empty() {
        if params.len() < 2 {
            return Err(Error::BadRequest(
                "SVG locator parameters must be width,height".to_string(),
            ));
        }
        return Ok(Source::Fetch {
            alt_width: params[0].parse().ok(),
            alt_height: params[1].parse().ok(),
        });
    }

    if locator == "_blank" {
        if params.len() < 3 {
            return Err(Error::BadRequest(
                "_blank requires mode,width,height parameters".to_string(),
            ));
        }
        if params[0] == "rgba" {
            let width: u32 = params[1]
                .parse()
                .map_err(|_| Error::BadRequest("invalid blank image width".to_string()))?;
            let height: u32 = params[2]
                .parse()
                .map_err(|_| Error::BadRequest("invalid blank image height".to_string()))?;

            if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
                return Err(Error::BadRequest(
                    "invalid blank image dimensions".to_string(),
                ));
            }

            return Ok(Source::Blank(DynamicImage::new_rgba8(width, height)));
        }
    }

    Ok(Source::Fetch {
        alt_width: None,
        alt_height: None,
    })
}

/// GET {path}/:url/*pipeline - the image transformation endpoint
pub async fn handle_image(
    State(ctx): State<AppContext>,
    matched_path: MatchedPath,
    uri: Uri,
) -> Result<Response> {
    let matched = matched_path.as_str();
    debug!("Path: {}", matched);

    // The binding prefix ends where the locator parameter starts
    let prefix_len = matched.find("/:url").unwrap_or(matched.len());
    let prefix = &matched[..prefix_len];

    let binding = ctx.binding_for(prefix);

    // The locator and pipeline are parsed from the raw (still
    // percent-encoded) path so that encoded slashes stay inside the
    // locator segment
    let raw_path = uri.path();
    let rest = raw_path
        .get(prefix.len()..)
        .unwrap_or("")
        .trim_start_matches('/');

    let (raw_locator, pipeline_tail) = match rest.split_once('/') {
        Some((locator, tail)) => (locator, tail),
        None => (rest, ""),
    };

    let image_url = percent_decode_str(raw_locator)
        .decode_utf8()
        .map_err(|_| {
            Error::BadRequest("Invalid URL passed. Have you tried URL escaping it?".to_string())
        })?
        .into_owned();
    debug!("url={}", image_url);

    let (image_url, file_params) = split_file_params(&image_url);
    let source = classify_source(&image_url, &file_params, ctx.config.server.max_image_dimension)?;

    // Parse and validate the whole pipeline before doing any work
    let actions = parse_pipeline(pipeline_tail)?;

    let (mut img, content_type) = match source {
        Source::Blank(img) => (img, "image/png".to_string()),
        Source::Fetch {
            alt_width,
            alt_height,
        } => {
            let binding = binding
                .ok_or_else(|| {
                    Error::BadRequest("No fetcher is defined for specified path".to_string())
                })?;
            let fetcher = binding.fetcher.as_ref().ok_or_else(|| {
                Error::BadRequest("No fetcher is defined for specified path".to_string())
            })?;

            let fetched = fetcher
                .fetch(&image_url)
                .await?
                .ok_or_else(|| Error::NotFound("file not found".to_string()))?;

            debug!(
                "Image Content-Type={}   url={}",
                fetched.content_type, image_url
            );

            codec::decode_image(
                &image_url,
                &fetched.content_type,
                &fetched.body,
                alt_width,
                alt_height,
                ctx.config.server.max_image_dimension,
            )?
        }
    };

    let mut encode_opts = EncodeOptions::default();
    {
        let mut mctx = ManipulatorContext {
            config: &ctx.config,
            cache: &*ctx.cache,
            detectors: &ctx.detectors,
            http: &ctx.http,
            locator: &image_url,
            encode: &mut encode_opts,
        };

        for action in &actions {
            debug!("Manipulator requested: {}", action.name);
            if let Some(manipulator) = ctx.manipulators.by_name(&action.name) {
                img = manipulator.execute(&mut mctx, &action.params, img).await?;
            }
        }
    }

    let output_content_type = encode_opts
        .content_type
        .clone()
        .unwrap_or(content_type);

    let cache_control = ctx
        .binding_for(prefix)
        .and_then(|b| b.cache_control.clone())
        .or_else(|| {
            let default = &ctx.config.cache_control_header;
            (!default.is_empty()).then(|| default.clone())
        });

    let body = codec::encode_image(&img, &output_content_type, &encode_opts)?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, output_content_type.as_str());
    if let Some(cache_control) = cache_control {
        response = response.header(CACHE_CONTROL, cache_control.as_str());
    }

    response
        .body(Body::from(body))
        .map_err(|e| Error::Config(format!("failed to build response: {}", e)))
}
