//! Resize operator

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Maps a resampling filter name from the `r` parameter. Unknown names fall
/// back to linear.
pub(crate) fn filter_by_name(name: &str) -> FilterType {
    match name {
        "nearest" => FilterType::Nearest,
        "box" | "linear" => FilterType::Triangle,
        "gaussian" => FilterType::Gaussian,
        "mitchellnetravali" | "catmullrom" => FilterType::CatmullRom,
        "lanczos" => FilterType::Lanczos3,
        _ => FilterType::Triangle,
    }
}

fn round_half_up(value: f64) -> u32 {
    (value + 0.5).floor().max(1.0) as u32
}

/// Derives the missing side from the source aspect ratio (half-up
/// rounding). At least one of width/height must be given.
pub(crate) fn resize_dims(
    src_w: u32,
    src_h: u32,
    width: Option<f64>,
    height: Option<f64>,
) -> Result<(u32, u32)> {
    if width.is_none() && height.is_none() {
        return Err(Error::Manipulator(
            "resize requires at least one of width or height".to_string(),
        ));
    }

    let ratio = (src_w.max(src_h) as f64) / (src_w.min(src_h) as f64);

    let (w, h) = if src_w > src_h {
        match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (None, Some(h)) => (h * ratio, h),
            (Some(w), None) => (w, w / ratio),
            (None, None) => unreachable!(),
        }
    } else {
        match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (None, Some(h)) => (h / ratio, h),
            (Some(w), None) => (w, w * ratio),
            (None, None) => unreachable!(),
        }
    };

    Ok((round_half_up(w), round_half_up(h)))
}

/// Shared by `resize` and `fit`
pub(crate) fn apply(img: &DynamicImage, width: u32, height: u32, filter: &str) -> DynamicImage {
    img.resize_exact(width, height, filter_by_name(filter))
}

/// Resizes the image to the requested dimensions. When only one of `w`/`h`
/// is given the other is derived from the source aspect ratio.
pub struct Resize;

#[async_trait]
impl Manipulator for Resize {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        let width = params.get("w").and_then(|v| v.parse::<f64>().ok());
        let height = params.get("h").and_then(|v| v.parse::<f64>().ok());
        let filter = params.get("r").map(String::as_str).unwrap_or("linear");

        let (w, h) = resize_dims(img.width(), img.height(), width, height)?;
        debug!(
            "resize: {}x{} -> {}x{}",
            img.width(),
            img.height(),
            w,
            h
        );

        Ok(apply(&img, w, h, filter))
    }
}
