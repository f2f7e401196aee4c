//! Face detection providers
//!
//! A detector ships the working pixel buffer to an external provider and
//! returns face bounding rectangles in source pixel coordinates. Detector
//! failures are never fatal to a request; the face-crop manipulator logs
//! them and passes the image through unchanged.

use crate::config::FaceApiConfig;
use crate::error::Result;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

mod google;
mod microsoft;
mod rekognition;

pub use google::GoogleCloudVisionDetector;
pub use microsoft::MicrosoftFaceApiDetector;
pub use rekognition::AwsRekognitionDetector;

/// Uses the Microsoft Face detection API
pub const MICROSOFT_FACE_API: &str = "microsoftFaceAPI";
/// Uses the Google Cloud Vision face detection API
pub const GOOGLE_CLOUD_VISION_API: &str = "googleCloudVisionAPI";
/// Uses AWS Rekognition
pub const AWS_REKOGNITION_API: &str = "awsRekognition";

/// Axis-aligned rectangle in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Rect {
        Rect { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    /// Smallest rectangle enclosing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Single interface over the supported facial detection APIs
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, cfg: &FaceApiConfig, img: &DynamicImage) -> Result<Vec<Rect>>;
}

/// Immutable registry of the available detectors
pub struct DetectorRegistry {
    detectors: HashMap<&'static str, Box<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn new(http_timeout: Duration) -> DetectorRegistry {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .expect("failed to build HTTP client");

        let mut detectors: HashMap<&'static str, Box<dyn Detector>> = HashMap::new();
        detectors.insert(
            MICROSOFT_FACE_API,
            Box::new(MicrosoftFaceApiDetector::new(client.clone())),
        );
        detectors.insert(
            GOOGLE_CLOUD_VISION_API,
            Box::new(GoogleCloudVisionDetector::new(client)),
        );
        detectors.insert(AWS_REKOGNITION_API, Box::new(AwsRekognitionDetector::new()));

        DetectorRegistry { detectors }
    }

    pub fn by_name(&self, name: &str) -> Option<&dyn Detector> {
        self.detectors.get(name).map(|d| d.as_ref())
    }
}
