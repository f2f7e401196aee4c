//! Shear operators

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

fn shear_factor(params: &Params) -> Result<Option<f32>> {
    let Some(angle) = params.get("a").and_then(|v| v.parse::<f64>().ok()) else {
        return Ok(None);
    };

    let tan = (angle.to_radians() as f32).tan();
    if !tan.is_finite() {
        return Err(Error::Manipulator(format!(
            "shear angle {} is degenerate",
            angle
        )));
    }

    Ok(Some(tan))
}

fn shear(img: &DynamicImage, tan: f32, horizontal: bool, max_dim: u32) -> Result<DynamicImage> {
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width() as f32, rgba.height() as f32);

    let (new_w, new_h, matrix) = if horizontal {
        let offset = if tan < 0.0 { h * tan.abs() } else { 0.0 };
        let new_w = (w + h * tan.abs()).round().max(1.0) as u32;
        (
            new_w,
            rgba.height(),
            [1.0, tan, offset, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        )
    } else {
        let offset = if tan < 0.0 { w * tan.abs() } else { 0.0 };
        let new_h = (h + w * tan.abs()).round().max(1.0) as u32;
        (
            rgba.width(),
            new_h,
            [1.0, 0.0, 0.0, tan, 1.0, offset, 0.0, 0.0, 1.0],
        )
    };

    // Angles near 90 degrees make the sheared bounds explode
    if new_w > max_dim || new_h > max_dim {
        return Err(Error::Manipulator(format!(
            "sheared dimensions {}x{} exceed the maximum allowed dimension {}",
            new_w, new_h, max_dim
        )));
    }

    let projection = Projection::from_matrix(matrix)
        .ok_or_else(|| Error::Manipulator("shear projection is not invertible".to_string()))?;

    let mut canvas = RgbaImage::from_pixel(new_w, new_h, TRANSPARENT);
    warp_into(&rgba, &projection, Interpolation::Bilinear, TRANSPARENT, &mut canvas);

    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Shears the image horizontally by `a` degrees
pub struct ShearHorizontal;

#[async_trait]
impl Manipulator for ShearHorizontal {
    async fn execute(
        &self,
        ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        match shear_factor(params)? {
            Some(tan) => shear(&img, tan, true, ctx.config.server.max_image_dimension),
            None => Ok(img),
        }
    }
}

/// Shears the image vertically by `a` degrees
pub struct ShearVertical;

#[async_trait]
impl Manipulator for ShearVertical {
    async fn execute(
        &self,
        ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        match shear_factor(params)? {
            Some(tan) => shear(&img, tan, false, ctx.config.server.max_image_dimension),
            None => Ok(img),
        }
    }
}
