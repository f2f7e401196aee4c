//! AWS Rekognition face detector

use super::{Detector, Rect};
use crate::codec;
use crate::config::FaceApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{Attribute, Image};
use image::DynamicImage;
use tracing::debug;

/// Facial detection via AWS Rekognition's DetectFaces API. Rekognition
/// reports relative bounding boxes; they are scaled back to pixel
/// coordinates against the working buffer.
pub struct AwsRekognitionDetector;

impl AwsRekognitionDetector {
    pub fn new() -> AwsRekognitionDetector {
        AwsRekognitionDetector
    }
}

impl Default for AwsRekognitionDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Detector for AwsRekognitionDetector {
    async fn detect(&self, cfg: &FaceApiConfig, img: &DynamicImage) -> Result<Vec<Rect>> {
        debug!("Detecting using AWS Rekognition");

        let jpeg = codec::encode_jpeg(img, codec::DEFAULT_JPEG_QUALITY)
            .map_err(|e| Error::Detector(e.to_string()))?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if !cfg.aws_rekognition.region.is_empty() {
            loader = loader.region(aws_config::Region::new(cfg.aws_rekognition.region.clone()));
        }
        let aws_cfg = loader.load().await;
        let client = aws_sdk_rekognition::Client::new(&aws_cfg);

        let output = client
            .detect_faces()
            .image(Image::builder().bytes(Blob::new(jpeg)).build())
            .attributes(Attribute::Default)
            .send()
            .await
            .map_err(|e| Error::Detector(format!("Rekognition request failed: {}", e)))?;

        let img_width = img.width() as f32;
        let img_height = img.height() as f32;

        let faces: Vec<Rect> = output
            .face_details()
            .iter()
            .filter_map(|detail| {
                let bb = detail.bounding_box()?;
                let left = (bb.left()? * img_width) as i32;
                let top = (bb.top()? * img_height) as i32;
                let width = (bb.width()? * img_width) as i32;
                let height = (bb.height()? * img_height) as i32;
                Some(Rect::new(left, top, left + width, top + height))
            })
            .collect();

        debug!("Rekognition returned {} faces", faces.len());
        Ok(faces)
    }
}
