//! Rotate operator

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::Result;
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate, warp_into, Interpolation, Projection};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Rotates the image by `a` degrees. `r=1` grows the canvas to the rotated
/// bounds; `p=x|y` sets the pivot point (default: image center).
pub struct Rotate;

#[async_trait]
impl Manipulator for Rotate {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        let Some(angle) = params.get("a").and_then(|v| v.parse::<f64>().ok()) else {
            return Ok(img);
        };

        let resize_bounds = params.get("r").map(String::as_str) == Some("1");
        let pivot = params.get("p").and_then(|p| parse_pivot(p));

        let theta = angle.to_radians() as f32;
        let rgba = img.to_rgba8();
        let (w, h) = (rgba.width() as f32, rgba.height() as f32);

        let rotated = if resize_bounds {
            let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
            let new_w = (w * cos + h * sin).round().max(1.0) as u32;
            let new_h = (w * sin + h * cos).round().max(1.0) as u32;

            let projection = Projection::translate(new_w as f32 / 2.0, new_h as f32 / 2.0)
                * Projection::rotate(theta)
                * Projection::translate(-w / 2.0, -h / 2.0);

            let mut canvas = RgbaImage::from_pixel(new_w, new_h, TRANSPARENT);
            warp_into(&rgba, &projection, Interpolation::Bilinear, TRANSPARENT, &mut canvas);
            canvas
        } else {
            let center = pivot.unwrap_or((w / 2.0, h / 2.0));
            rotate(&rgba, center, theta, Interpolation::Bilinear, TRANSPARENT)
        };

        Ok(DynamicImage::ImageRgba8(rotated))
    }
}

fn parse_pivot(value: &str) -> Option<(f32, f32)> {
    let (x, y) = value.split_once('|')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::test_support::{run, test_image};

    #[tokio::test]
    async fn test_full_turn_keeps_dimensions() {
        let out = run(&Rotate, &[("a", "360"), ("r", "0")], test_image(40, 20))
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (40, 20));
    }

    #[tokio::test]
    async fn test_quarter_turn_with_resize_swaps_dimensions() {
        let out = run(&Rotate, &[("a", "90"), ("r", "1")], test_image(40, 20))
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (20, 40));
    }

    #[tokio::test]
    async fn test_four_quarter_turns_restore_dimensions() {
        let mut img = test_image(40, 20);
        for _ in 0..4 {
            img = run(&Rotate, &[("a", "90"), ("r", "1")], img).await.unwrap();
        }
        assert_eq!((img.width(), img.height()), (40, 20));
    }

    #[tokio::test]
    async fn test_rotate_without_resize_keeps_dimensions() {
        let out = run(&Rotate, &[("a", "45")], test_image(30, 30)).await.unwrap();
        assert_eq!((out.width(), out.height()), (30, 30));
    }

    #[tokio::test]
    async fn test_missing_angle_passes_through() {
        let img = test_image(10, 10);
        let original = img.to_rgba8();
        let out = run(&Rotate, &[], img).await.unwrap();
        assert_eq!(out.to_rgba8(), original);
    }

    #[test]
    fn test_parse_pivot() {
        assert_eq!(parse_pivot("5|35"), Some((5.0, 35.0)));
        assert_eq!(parse_pivot("bad"), None);
        assert_eq!(parse_pivot("1|x"), None);
    }
}
