//! Brightness and contrast operators
//!
//! Both take a percentage value `v` in -100..+100, clamped, and convert it
//! to a -1..+1 factor.

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;

fn factor(params: &Params) -> Result<Option<f64>> {
    let Some(raw) = params.get("v") else {
        return Ok(None);
    };

    let value: f64 = raw
        .parse()
        .map_err(|_| Error::Manipulator(format!("invalid adjustment value: '{}'", raw)))?;

    Ok(Some(value.clamp(-100.0, 100.0) / 100.0))
}

/// Adjusts brightness: each color channel is scaled by `1 + factor`.
pub struct Brightness;

#[async_trait]
impl Manipulator for Brightness {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        let Some(factor) = factor(params)? else {
            return Ok(img);
        };

        let scale = 1.0 + factor;
        let mut rgba = img.to_rgba8();
        for pixel in rgba.pixels_mut() {
            for channel in &mut pixel.0[..3] {
                *channel = (*channel as f64 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

/// Adjusts contrast around the midpoint.
pub struct Contrast;

#[async_trait]
impl Manipulator for Contrast {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        let Some(factor) = factor(params)? else {
            return Ok(img);
        };

        Ok(img.adjust_contrast((factor * 100.0) as f32))
    }
}
