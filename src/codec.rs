//! Image decode/encode boundary
//!
//! Decode selects by content type with file-extension fallback; SVG sources
//! are rasterized. Encode selects by the output content type chosen by the
//! pipeline (default: the source content type), with per-request encoder
//! options carried in [`EncodeOptions`].

use crate::error::{Error, Result};
use crate::mime::mime_type_by_file_ext;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use resvg::usvg;
use std::io::Cursor;

/// Default JPEG quality when the pipeline sets none
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Per-request encoder state, mutated by the `output` operator and consumed
/// once at encode time.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Output content type; `None` keeps the source content type
    pub content_type: Option<String>,
    /// JPEG/WebP quality (1-100)
    pub quality: Option<u8>,
    /// WebP lossless mode
    pub lossless: bool,
    /// WebP exact-alpha mode
    pub exact: bool,
    /// Alternative encoder hint
    pub encoder: Option<String>,
}

/// Decodes fetched bytes into a pixel buffer.
///
/// `alt_width`/`alt_height` are the rasterization dimensions for SVG
/// sources, parsed from the locator suffix. Returns the buffer together
/// with the resolved content type. Images exceeding `max_dimension` on
/// either side are rejected.
pub fn decode_image(
    locator: &str,
    content_type: &str,
    body: &[u8],
    alt_width: Option<u32>,
    alt_height: Option<u32>,
    max_dimension: u32,
) -> Result<(DynamicImage, String)> {
    let content_type = if content_type.is_empty() {
        mime_type_by_file_ext(locator)
    } else {
        content_type
    };

    if content_type.is_empty() {
        return Err(Error::Decode(
            "content type is missing and could not be inferred".to_string(),
        ));
    }

    let img = match content_type {
        "image/jpg" | "image/jpeg" => load(body, ImageFormat::Jpeg)?,
        "image/png" => load(body, ImageFormat::Png)?,
        "image/webp" => load(body, ImageFormat::WebP)?,
        "image/gif" => load(body, ImageFormat::Gif)?,
        "image/svg+xml" => rasterize_svg(body, alt_width, alt_height)?,
        other => {
            return Err(Error::Decode(format!("unknown content type '{}'", other)));
        }
    };

    if img.width() > max_dimension || img.height() > max_dimension {
        return Err(Error::Decode(format!(
            "image dimensions {}x{} exceed the maximum allowed dimension {}",
            img.width(),
            img.height(),
            max_dimension
        )));
    }

    Ok((img, content_type.to_string()))
}

fn load(body: &[u8], format: ImageFormat) -> Result<DynamicImage> {
    image::load_from_memory_with_format(body, format)
        .map_err(|e| Error::Decode(format!("failed to decode image: {}", e)))
}

/// Rasterizes an SVG document. The requested width/height are combined with
/// the intrinsic viewbox aspect ratio: when only one side is given the
/// other is derived; when neither is given the intrinsic size is kept.
fn rasterize_svg(
    body: &[u8],
    alt_width: Option<u32>,
    alt_height: Option<u32>,
) -> Result<DynamicImage> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(body, &options)
        .map_err(|e| Error::Decode(format!("failed to parse SVG: {}", e)))?;

    let size = tree.size();
    let (src_w, src_h) = (size.width(), size.height());
    if src_w <= 0.0 || src_h <= 0.0 {
        return Err(Error::Decode("SVG has an empty viewbox".to_string()));
    }

    let ratio = src_w.max(src_h) / src_w.min(src_h);
    let width_bigger = src_w > src_h;

    let (target_w, target_h) = match (alt_width, alt_height) {
        (None, None) => (src_w, src_h),
        (Some(w), None) => {
            let w = w as f32;
            let h = if width_bigger { w / ratio } else { w * ratio };
            (w, h)
        }
        (None, Some(h)) => {
            let h = h as f32;
            let w = if width_bigger { h * ratio } else { h / ratio };
            (w, h)
        }
        (Some(w), Some(h)) => (w as f32, h as f32),
    };

    let target_w = (target_w.round() as u32).max(1);
    let target_h = (target_h.round() as u32).max(1);

    let mut pixmap = tiny_skia::Pixmap::new(target_w, target_h)
        .ok_or_else(|| Error::Decode("failed to allocate SVG canvas".to_string()))?;

    let transform =
        tiny_skia::Transform::from_scale(target_w as f32 / src_w, target_h as f32 / src_h);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let mut img = RgbaImage::new(target_w, target_h);
    for (out, px) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = px.demultiply();
        *out = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }

    Ok(DynamicImage::ImageRgba8(img))
}

/// Encodes the final pixel buffer per the output content type.
pub fn encode_image(
    img: &DynamicImage,
    content_type: &str,
    opts: &EncodeOptions,
) -> Result<Vec<u8>> {
    match content_type {
        "image/jpg" | "image/jpeg" => encode_jpeg(img, opts.quality.unwrap_or(DEFAULT_JPEG_QUALITY)),
        "image/png" => {
            let mut buf = Cursor::new(Vec::new());
            img.write_with_encoder(PngEncoder::new(&mut buf))
                .map_err(|e| Error::Encode(format!("PNG encode failed: {}", e)))?;
            Ok(buf.into_inner())
        }
        "image/webp" => encode_webp(img, opts),
        other => Err(Error::Encode(format!("unknown content type '{}'", other))),
    }
}

/// JPEG encode helper, also used by the face detectors to ship the working
/// buffer to a provider.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .map_err(|e| Error::Encode(format!("JPEG encode failed: {}", e)))?;
    Ok(buf.into_inner())
}

fn encode_webp(img: &DynamicImage, opts: &EncodeOptions) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let quality = opts.quality.unwrap_or(DEFAULT_JPEG_QUALITY) as f32;

    if opts.lossless || opts.exact {
        let mut config = webp::WebPConfig::new()
            .map_err(|_| Error::Encode("WebP config init failed".to_string()))?;
        config.lossless = opts.lossless as i32;
        config.exact = opts.exact as i32;
        config.quality = quality;
        let mem = encoder
            .encode_advanced(&config)
            .map_err(|e| Error::Encode(format!("WebP encode failed: {:?}", e)))?;
        Ok(mem.to_vec())
    } else {
        Ok(encoder.encode(quality).to_vec())
    }
}
