//! Output format operator
//!
//! Does not touch pixels; records the output content type and encoder
//! options consumed once the pipeline completes.

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::Result;
use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;

fn content_type_for_format(format: &str) -> Option<&'static str> {
    match format {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "true" | "1")
}

/// Sets the content type used to encode the final image, plus optional
/// quality, WebP flags and an encoder hint.
pub struct Output;

#[async_trait]
impl Manipulator for Output {
    async fn execute(
        &self,
        ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        // The format value was validated at parse time
        let Some(content_type) = params.get("f").and_then(|f| content_type_for_format(f)) else {
            return Ok(img);
        };

        ctx.encode.content_type = Some(content_type.to_string());

        if content_type == "image/jpeg" || content_type == "image/webp" {
            if let Some(q) = params.get("q").and_then(|q| q.parse::<u8>().ok()) {
                ctx.encode.quality = Some(q);
            }
        }

        if content_type == "image/webp" {
            if let Some(lossless) = params.get("lossless") {
                ctx.encode.lossless = parse_bool(lossless);
            }
            if let Some(exact) = params.get("exact") {
                ctx.encode.exact = parse_bool(exact);
            }
        }

        if let Some(encoder) = params.get("e") {
            debug!("Setting encoder hint '{}'", encoder);
            ctx.encode.encoder = Some(encoder.clone());
        }

        Ok(img)
    }
}
