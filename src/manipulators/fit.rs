//! Fit operator

use super::resize;
use super::{Manipulator, ManipulatorContext, Params};
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;

/// Scales the image to fit inside the `w`x`h` box while preserving the
/// source aspect ratio. Both dimensions are required.
pub struct Fit;

#[async_trait]
impl Manipulator for Fit {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        let max_w = params
            .get("w")
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| Error::Manipulator("fit requires a width (w) value".to_string()))?;
        let max_h = params
            .get("h")
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| Error::Manipulator("fit requires a height (h) value".to_string()))?;
        let filter = params.get("r").map(String::as_str).unwrap_or("linear");

        let (src_w, src_h) = (img.width(), img.height());
        if src_w == 0 || src_h == 0 {
            return Err(Error::Manipulator(
                "invalid width or height of source image".to_string(),
            ));
        }

        let src_ratio = src_w as f64 / src_h as f64;
        let max_ratio = max_w as f64 / max_h as f64;

        let (new_w, new_h) = if src_ratio > max_ratio {
            let w = max_w;
            (w, (w as f64 / src_ratio) as u32)
        } else {
            let h = max_h;
            ((h as f64 * src_ratio) as u32, h)
        };

        Ok(resize::apply(&img, new_w.max(1), new_h.max(1), filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::test_support::{run, test_image};

    #[tokio::test]
    async fn test_fit_wide_source_constrained_by_width() {
        let out = run(&Fit, &[("w", "50"), ("h", "50")], test_image(200, 100))
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (50, 25));
    }

    #[tokio::test]
    async fn test_fit_tall_source_constrained_by_height() {
        let out = run(&Fit, &[("w", "50"), ("h", "50")], test_image(100, 200))
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (25, 50));
    }

    #[tokio::test]
    async fn test_fit_never_exceeds_box() {
        for (sw, sh) in [(123, 45), (45, 123), (100, 100), (7, 500)] {
            let out = run(&Fit, &[("w", "64"), ("h", "48")], test_image(sw, sh))
                .await
                .unwrap();
            assert!(out.width() <= 64, "{}x{} gave width {}", sw, sh, out.width());
            assert!(out.height() <= 48, "{}x{} gave height {}", sw, sh, out.height());
        }
    }

    #[tokio::test]
    async fn test_fit_requires_both_dimensions() {
        assert!(run(&Fit, &[("w", "50")], test_image(10, 10)).await.is_err());
        assert!(run(&Fit, &[("h", "50")], test_image(10, 10)).await.is_err());
    }
}
