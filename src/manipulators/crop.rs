//! Crop operator

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;

/// Crops the image. Two forms:
///
/// - `x`,`y`,`w`,`h`: absolute rectangle, bounds-checked against the image
/// - `r=x0|y0|x1|y1`: legacy rectangle; negative x1/y1 count back from the
///   image size. `r=W%|H%` crops from the origin to a percentage of the
///   source size.
pub struct Crop;

#[async_trait]
impl Manipulator for Crop {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        if params.contains_key("x") {
            return crop_absolute(params, img);
        }

        if let Some(r) = params.get("r") {
            return crop_legacy_rect(r, img);
        }

        Ok(img)
    }
}

fn crop_absolute(params: &Params, img: DynamicImage) -> Result<DynamicImage> {
    let get = |key: &str| -> Result<u32> {
        params
            .get(key)
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| Error::Manipulator("crop requires x, y, w, h parameters".to_string()))
    };

    let (x, y, w, h) = (get("x")?, get("y")?, get("w")?, get("h")?);

    if w == 0 || h == 0 {
        return Err(Error::Manipulator(
            "invalid crop parameters: zero width or height".to_string(),
        ));
    }
    if x + w > img.width() || y + h > img.height() {
        return Err(Error::Manipulator("crop area exceeds image bounds".to_string()));
    }

    Ok(img.crop_imm(x, y, w, h))
}

fn crop_legacy_rect(r: &str, img: DynamicImage) -> Result<DynamicImage> {
    let parts: Vec<&str> = r.split('|').collect();

    if parts.len() == 2 {
        if parts[0].ends_with('%') && parts[1].ends_with('%') {
            return crop_percentage(parts[0], parts[1], img);
        }
        return Err(Error::Manipulator(
            "crop rectangle (r) with 2 values must be percentages of the width and height"
                .to_string(),
        ));
    }

    if parts.len() != 4 {
        return Err(Error::Manipulator(
            "crop rectangle (r) must have 4 values separated by a '|' sign".to_string(),
        ));
    }

    let parse = |s: &str| -> Result<i64> {
        s.parse()
            .map_err(|_| Error::Manipulator("one of the crop rectangle (r) values is invalid".to_string()))
    };

    let x0 = parse(parts[0])?;
    let y0 = parse(parts[1])?;
    let mut x1 = parse(parts[2])?;
    let mut y1 = parse(parts[3])?;

    // Negative end coordinates are relative to the image size
    if x1 < 0 {
        x1 += img.width() as i64;
    }
    if y1 < 0 {
        y1 += img.height() as i64;
    }

    let x0 = x0.clamp(0, img.width() as i64);
    let y0 = y0.clamp(0, img.height() as i64);
    let x1 = x1.clamp(0, img.width() as i64);
    let y1 = y1.clamp(0, img.height() as i64);

    if x1 <= x0 || y1 <= y0 {
        return Err(Error::Manipulator("crop rectangle (r) is empty".to_string()));
    }

    Ok(img.crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

fn crop_percentage(width_part: &str, height_part: &str, img: DynamicImage) -> Result<DynamicImage> {
    let parse = |s: &str| -> Result<f64> {
        s.trim_end_matches('%')
            .parse()
            .map_err(|_| Error::Manipulator("invalid percentage values for crop".to_string()))
    };

    let width_pct = parse(width_part)?;
    let height_pct = parse(height_part)?;

    let x1 = (img.width() as f64 * (width_pct / 100.0)) as u32;
    let y1 = (img.height() as f64 * (height_pct / 100.0)) as u32;

    if x1 == 0 || y1 == 0 {
        return Err(Error::Manipulator("crop rectangle (r) is empty".to_string()));
    }

    Ok(img.crop_imm(0, 0, x1.min(img.width()), y1.min(img.height())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::test_support::{run, test_image};

    #[tokio::test]
    async fn test_absolute_crop() {
        let out = run(
            &Crop,
            &[("x", "10"), ("y", "10"), ("w", "50"), ("h", "50")],
            test_image(100, 100),
        )
        .await
        .unwrap();
        assert_eq!((out.width(), out.height()), (50, 50));
    }

    #[tokio::test]
    async fn test_absolute_crop_preserves_pixels() {
        let img = test_image(100, 100);
        let expected = *img.to_rgba8().get_pixel(10, 20);

        let out = run(
            &Crop,
            &[("x", "10"), ("y", "20"), ("w", "30"), ("h", "30")],
            img,
        )
        .await
        .unwrap();
        assert_eq!(*out.to_rgba8().get_pixel(0, 0), expected);
    }

    #[tokio::test]
    async fn test_crop_exactly_at_bounds_succeeds() {
        let out = run(
            &Crop,
            &[("x", "50"), ("y", "50"), ("w", "50"), ("h", "50")],
            test_image(100, 100),
        )
        .await
        .unwrap();
        assert_eq!((out.width(), out.height()), (50, 50));
    }

    #[tokio::test]
    async fn test_crop_out_of_bounds_fails() {
        let err = run(
            &Crop,
            &[("x", "60"), ("y", "0"), ("w", "50"), ("h", "50")],
            test_image(100, 100),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("exceeds image bounds"));
    }

    #[tokio::test]
    async fn test_crop_requires_all_four_params() {
        let err = run(&Crop, &[("x", "0"), ("y", "0"), ("w", "10")], test_image(50, 50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("x, y, w, h"));
    }

    #[tokio::test]
    async fn test_legacy_rect() {
        let out = run(&Crop, &[("r", "10|10|60|60")], test_image(100, 100))
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (50, 50));
    }

    #[tokio::test]
    async fn test_legacy_rect_negative_end_is_relative() {
        // x1=-10 -> 90, y1=-20 -> 80
        let out = run(&Crop, &[("r", "0|0|-10|-20")], test_image(100, 100))
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (90, 80));
    }

    #[tokio::test]
    async fn test_percentage_crop() {
        let out = run(&Crop, &[("r", "50%|25%")], test_image(200, 100))
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (100, 25));
    }

    #[tokio::test]
    async fn test_two_values_without_percent_fails() {
        assert!(run(&Crop, &[("r", "50|25")], test_image(100, 100)).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_value_count_fails() {
        assert!(run(&Crop, &[("r", "1|2|3")], test_image(100, 100)).await.is_err());
    }

    #[tokio::test]
    async fn test_no_params_passes_through() {
        let out = run(&Crop, &[], test_image(40, 30)).await.unwrap();
        assert_eq!((out.width(), out.height()), (40, 30));
    }
}
