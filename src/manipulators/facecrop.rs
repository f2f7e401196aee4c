//! Face-aware crop operator
//!
//! Detects faces through the configured provider, caches the rectangles
//! process-wide, and crops to the padded union of all faces. Detector
//! failures are logged and the image passes through unchanged.

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::Result;
use crate::face::Rect;
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use tracing::{debug, error};

const DEFAULT_PADDING: f64 = 0.2;

const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Crops the image to include most of the detected faces. `provider`
/// selects the detector, `pp` the padding fraction, `kio=1` (default)
/// keeps the source orientation and `debug=1` draws the detection stages
/// instead of cropping.
pub struct FaceCrop;

#[async_trait]
impl Manipulator for FaceCrop {
    async fn execute(
        &self,
        ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        let provider = params
            .get("provider")
            .cloned()
            .unwrap_or_else(|| ctx.config.faceapi.default_provider.clone());

        debug!("Try to find detector for provider '{}'", provider);
        let Some(detector) = ctx.detectors.by_name(&provider) else {
            return Ok(img);
        };

        let cache_key = format!("face-{}-{}", provider, ctx.locator);
        let use_cache = params.get("useCache").map(String::as_str) != Some("0");

        let faces: Vec<Rect> = if use_cache && ctx.cache.contains(&cache_key).await {
            debug!("Found faces in cache");
            ctx.cache
                .get(&cache_key)
                .await
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default()
        } else {
            let detected = match detector.detect(&ctx.config.faceapi, &img).await {
                Ok(faces) => faces,
                Err(e) => {
                    // Detector failures never fail the request
                    error!("{}", e);
                    Vec::new()
                }
            };

            if use_cache {
                if let Ok(value) = serde_json::to_value(&detected) {
                    ctx.cache.set(&cache_key, value).await;
                }
            }

            detected
        };

        debug!("Faces: {:?}", faces);
        if faces.is_empty() {
            return Ok(img);
        }

        let debug_mode = params.get("debug").map(String::as_str) == Some("1");
        let mut debug_canvas = if debug_mode { Some(img.to_rgba8()) } else { None };

        let mut union = faces[0];
        for face in &faces {
            union = union.union(face);
            if let Some(canvas) = debug_canvas.as_mut() {
                draw_rect(canvas, face, 3, BLUE);
            }
        }

        if let Some(canvas) = debug_canvas.as_mut() {
            draw_rect(canvas, &union, 4, GREEN);
        }

        let padding = params
            .get("pp")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_PADDING);
        let mut bound = pad_rect(&union, padding);

        if let Some(canvas) = debug_canvas.as_mut() {
            draw_rect(canvas, &bound, 4, YELLOW);
        }

        let keep_orientation = params.get("kio").map(String::as_str).unwrap_or("1") == "1";
        if keep_orientation {
            bound = reshape_to_orientation(&bound, img.width(), img.height());
        }

        let Some((x, y, w, h)) = clamp_rect(&bound, img.width(), img.height()) else {
            return Ok(img);
        };

        if let Some(mut canvas) = debug_canvas {
            let final_rect = Rect::new(
                x as i32,
                y as i32,
                (x + w) as i32,
                (y + h) as i32,
            );
            draw_rect(&mut canvas, &final_rect, 4, RED);
            return Ok(DynamicImage::ImageRgba8(canvas));
        }

        Ok(img.crop_imm(x, y, w, h))
    }
}

/// Grows the rectangle by a fraction of its own size on all four sides
fn pad_rect(rect: &Rect, padding: f64) -> Rect {
    let w_pad = (rect.width() as f64 * padding) as i32;
    let h_pad = (rect.height() as f64 * padding) as i32;
    Rect::new(
        rect.x0 - w_pad,
        rect.y0 - h_pad,
        rect.x1 + w_pad,
        rect.y1 + h_pad,
    )
}

/// When the source is portrait but the face bound landscape, re-centers
/// the bound on its centroid and reshapes it to the source aspect ratio so
/// the crop can be used the same way the original was.
fn reshape_to_orientation(rect: &Rect, img_w: u32, img_h: u32) -> Rect {
    if img_h <= img_w || rect.width() <= rect.height() {
        return *rect;
    }

    let new_h = (rect.width() as f64 * (img_h as f64 / img_w as f64)).round() as i32;
    let cy = rect.y0 + rect.height() / 2;
    let mut y0 = cy - new_h / 2;
    let mut y1 = y0 + new_h;

    if y0 < 0 {
        y1 -= y0;
        y0 = 0;
    }
    if y1 > img_h as i32 {
        y0 -= y1 - img_h as i32;
        y1 = img_h as i32;
    }

    Rect::new(rect.x0, y0.max(0), rect.x1, y1)
}

/// Clamps the rectangle to the image bounds; `None` when nothing is left
fn clamp_rect(rect: &Rect, img_w: u32, img_h: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x0.clamp(0, img_w as i32);
    let y0 = rect.y0.clamp(0, img_h as i32);
    let x1 = rect.x1.clamp(0, img_w as i32);
    let y1 = rect.y1.clamp(0, img_h as i32);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

fn draw_rect(canvas: &mut RgbaImage, rect: &Rect, thickness: i32, color: Rgba<u8>) {
    for t in 0..thickness {
        let w = rect.width() - 2 * t;
        let h = rect.height() - 2 * t;
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            canvas,
            imageproc::rect::Rect::at(rect.x0 + t, rect.y0 + t).of_size(w as u32, h as u32),
            color,
        );
    }
}
