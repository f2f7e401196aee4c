//! Paste operator
//!
//! Composites a secondary image, fetched by URL, over the working buffer.
//! The secondary GET goes through the same SSRF envelope as the HTTP
//! fetcher and is capped at the configured maximum image byte size.

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::{Error, Result};
use crate::fetchers::ssrf;
use async_trait::async_trait;
use image::{imageops, DynamicImage};
use url::Url;

/// Horizontal/vertical placement of the pasted image inside the base
fn alignment_offset(align: &str, base: (u32, u32), pasted: (u32, u32)) -> (i64, i64) {
    let (bw, bh) = (base.0 as i64, base.1 as i64);
    let (pw, ph) = (pasted.0 as i64, pasted.1 as i64);

    match align {
        "topcenter" => (bw / 2 - pw / 2, 0),
        "center" => (bw / 2 - pw / 2, bh / 2 - ph / 2),
        "bottomcenter" => (bw / 2 - pw / 2, bh - ph),
        "centerleft" => (0, bh / 2 - ph / 2),
        "centerright" => (bw - pw, bh / 2 - ph / 2),
        _ => (0, 0),
    }
}

/// Pastes the image named by `img=<url>` over the working buffer with an
/// optional `align` tag.
pub struct Paste;

#[async_trait]
impl Manipulator for Paste {
    async fn execute(
        &self,
        ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        let Some(img_url) = params.get("img") else {
            return Ok(img);
        };

        let url = Url::parse(img_url)
            .map_err(|e| Error::Manipulator(format!("invalid paste URL: {}", e)))?;
        ssrf::check_url(&url).await?;

        let response = ctx
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Manipulator(format!("paste fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Manipulator(format!("paste fetch returned {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Manipulator(format!("paste read failed: {}", e)))?;
        if body.len() as u64 > ctx.config.server.max_image_size_bytes {
            return Err(Error::Manipulator(format!(
                "pasted image exceeds maximum allowed size ({} bytes)",
                ctx.config.server.max_image_size_bytes
            )));
        }

        let pasted = image::load_from_memory(&body)
            .map_err(|e| Error::Manipulator(format!("failed to decode pasted image: {}", e)))?;

        let mut canvas = img.to_rgba8();
        let align = params.get("align").map(String::as_str).unwrap_or("");
        let (x, y) = alignment_offset(
            align,
            (canvas.width(), canvas.height()),
            (pasted.width(), pasted.height()),
        );

        imageops::overlay(&mut canvas, &pasted.to_rgba8(), x, y);

        Ok(DynamicImage::ImageRgba8(canvas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::test_support::{run, test_image};

    #[test]
    fn test_alignment_offsets() {
        let base = (100, 80);
        let pasted = (20, 10);

        assert_eq!(alignment_offset("topcenter", base, pasted), (40, 0));
        assert_eq!(alignment_offset("center", base, pasted), (40, 35));
        assert_eq!(alignment_offset("bottomcenter", base, pasted), (40, 70));
        assert_eq!(alignment_offset("centerleft", base, pasted), (0, 35));
        assert_eq!(alignment_offset("centerright", base, pasted), (80, 35));
        assert_eq!(alignment_offset("", base, pasted), (0, 0));
        assert_eq!(alignment_offset("somewhere", base, pasted), (0, 0));
    }

    #[test]
    fn test_alignment_with_oversized_paste_goes_negative() {
        // A pasted image larger than the base clips via a negative offset
        assert_eq!(alignment_offset("center", (10, 10), (20, 20)), (-5, -5));
    }

    #[tokio::test]
    async fn test_no_img_param_passes_through() {
        let img = test_image(10, 10);
        let original = img.to_rgba8();
        let out = run(&Paste, &[], img).await.unwrap();
        assert_eq!(out.to_rgba8(), original);
    }

    #[tokio::test]
    async fn test_malformed_url_fails() {
        let err = run(&Paste, &[("img", "::nope::")], test_image(10, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Manipulator(_)));
    }

    #[tokio::test]
    async fn test_paste_source_goes_through_ssrf_envelope() {
        let err = run(
            &Paste,
            &[("img", "http://169.254.169.254/latest")],
            test_image(10, 10),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not allowed for security reasons"));
    }
}
