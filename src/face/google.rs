//! Google Cloud Vision face detector

use super::{Detector, Rect};
use crate::codec;
use crate::config::FaceApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use image::DynamicImage;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const VISION_ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
const MAX_RESULTS: u32 = 50;

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResult {
    #[serde(rename = "faceAnnotations", default)]
    face_annotations: Vec<FaceAnnotation>,
}

#[derive(Debug, Deserialize)]
struct FaceAnnotation {
    #[serde(rename = "boundingPoly")]
    bounding_poly: BoundingPoly,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

#[derive(Debug, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

/// Facial detection via the Cloud Vision `images:annotate` endpoint with a
/// FACE_DETECTION feature request.
pub struct GoogleCloudVisionDetector {
    client: reqwest::Client,
}

impl GoogleCloudVisionDetector {
    pub fn new(client: reqwest::Client) -> GoogleCloudVisionDetector {
        GoogleCloudVisionDetector { client }
    }
}

#[async_trait]
impl Detector for GoogleCloudVisionDetector {
    async fn detect(&self, cfg: &FaceApiConfig, img: &DynamicImage) -> Result<Vec<Rect>> {
        debug!("Detecting using Google Cloud Vision API");

        let jpeg = codec::encode_jpeg(img, codec::DEFAULT_JPEG_QUALITY)
            .map_err(|e| Error::Detector(e.to_string()))?;
        let content = base64::engine::general_purpose::STANDARD.encode(jpeg);

        let request = json!({
            "requests": [{
                "image": { "content": content },
                "features": [{ "type": "FACE_DETECTION", "maxResults": MAX_RESULTS }]
            }]
        });

        let response = self
            .client
            .post(VISION_ANNOTATE_URL)
            .query(&[("key", cfg.google_cloud_vision_api.key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Detector(format!("Cloud Vision request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Detector(format!("Cloud Vision returned {}", status)));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| Error::Detector(format!("Cloud Vision response invalid: {}", e)))?;

        let faces: Vec<Rect> = parsed
            .responses
            .first()
            .map(|r| r.face_annotations.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|f| rect_from_vertices(&f.bounding_poly.vertices))
            .collect();

        debug!("Cloud Vision returned {} faces", faces.len());
        Ok(faces)
    }
}

fn rect_from_vertices(vertices: &[Vertex]) -> Option<Rect> {
    if vertices.is_empty() {
        return None;
    }

    let x0 = vertices.iter().map(|v| v.x).min()?;
    let y0 = vertices.iter().map(|v| v.y).min()?;
    let x1 = vertices.iter().map(|v| v.x).max()?;
    let y1 = vertices.iter().map(|v| v.y).max()?;

    Some(Rect::new(x0, y0, x1, y1))
}
