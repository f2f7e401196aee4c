//! Microsoft Face API detector

use super::{Detector, Rect};
use crate::codec;
use crate::config::FaceApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct MicrosoftFace {
    #[serde(rename = "faceRectangle")]
    face_rectangle: MicrosoftFaceRectangle,
}

#[derive(Debug, Deserialize)]
struct MicrosoftFaceRectangle {
    top: i32,
    left: i32,
    width: i32,
    height: i32,
}

/// Facial detection via the Microsoft Face API. The working buffer is sent
/// as a JPEG octet stream to the configured endpoint.
pub struct MicrosoftFaceApiDetector {
    client: reqwest::Client,
}

impl MicrosoftFaceApiDetector {
    pub fn new(client: reqwest::Client) -> MicrosoftFaceApiDetector {
        MicrosoftFaceApiDetector { client }
    }
}

#[async_trait]
impl Detector for MicrosoftFaceApiDetector {
    async fn detect(&self, cfg: &FaceApiConfig, img: &DynamicImage) -> Result<Vec<Rect>> {
        debug!("Detecting using Microsoft Face API");

        let jpeg = codec::encode_jpeg(img, codec::DEFAULT_JPEG_QUALITY)
            .map_err(|e| Error::Detector(e.to_string()))?;

        let response = self
            .client
            .post(&cfg.microsoft_face_api.url)
            .header("Ocp-Apim-Subscription-Key", &cfg.microsoft_face_api.key)
            .header("Content-Type", "application/octet-stream")
            .body(jpeg)
            .send()
            .await
            .map_err(|e| Error::Detector(format!("Microsoft Face API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Detector(format!(
                "Microsoft Face API returned {}",
                status
            )));
        }

        let faces: Vec<MicrosoftFace> = response
            .json()
            .await
            .map_err(|e| Error::Detector(format!("Microsoft Face API response invalid: {}", e)))?;

        debug!("Microsoft Face API returned {} faces", faces.len());

        Ok(faces
            .iter()
            .map(|f| {
                let r = &f.face_rectangle;
                Rect::new(r.left, r.top, r.left + r.width, r.top + r.height)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let body = r#"[
            {"faceId": "abc", "faceRectangle": {"top": 10, "left": 20, "width": 30, "height": 40}},
            {"faceId": "def", "faceRectangle": {"top": 0, "left": 0, "width": 5, "height": 5}}
        ]"#;
        let faces: Vec<MicrosoftFace> = serde_json::from_str(body).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].face_rectangle.left, 20);
        assert_eq!(faces[0].face_rectangle.height, 40);
    }
}
