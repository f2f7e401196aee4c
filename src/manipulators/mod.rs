//! Image manipulators
//!
//! Each operator is a pure transformation over the pixel buffer, except
//! `output` which only records encoder state. Operators execute strictly in
//! URL order; each sees the output of the previous one. The registry is
//! built once at startup and shared across requests.

use crate::cache::Cache;
use crate::codec::EncodeOptions;
use crate::config::Config;
use crate::error::Result;
use crate::face::DetectorRegistry;
use async_trait::async_trait;
use image::DynamicImage;
use std::collections::HashMap;

mod adjust;
mod crop;
mod facecrop;
mod fit;
mod flip;
mod output;
mod paste;
pub mod pipeline;
mod resize;
mod rotate;
mod shear;

pub use pipeline::{parse_pipeline, Action, Params};

/// Shared request state visible to operators
pub struct ManipulatorContext<'a> {
    pub config: &'a Config,
    pub cache: &'a dyn Cache,
    pub detectors: &'a DetectorRegistry,
    /// Shared client for secondary fetches (paste)
    pub http: &'a reqwest::Client,
    /// Decoded source locator of the current request
    pub locator: &'a str,
    /// Encoder state consumed after the pipeline completes
    pub encode: &'a mut EncodeOptions,
}

/// A single pipeline operator
#[async_trait]
pub trait Manipulator: Send + Sync {
    async fn execute(
        &self,
        ctx: &mut ManipulatorContext<'_>,
        params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage>;
}

/// Static operator registry, keyed by the names used in the pipeline DSL
pub struct ManipulatorRegistry {
    manipulators: HashMap<&'static str, Box<dyn Manipulator>>,
}

impl ManipulatorRegistry {
    pub fn new() -> ManipulatorRegistry {
        let mut manipulators: HashMap<&'static str, Box<dyn Manipulator>> = HashMap::new();

        manipulators.insert("output", Box::new(output::Output));
        manipulators.insert("rotate", Box::new(rotate::Rotate));
        manipulators.insert("flipv", Box::new(flip::FlipVertical));
        manipulators.insert("fliph", Box::new(flip::FlipHorizontal));
        manipulators.insert("resize", Box::new(resize::Resize));
        manipulators.insert("fit", Box::new(fit::Fit));
        manipulators.insert("crop", Box::new(crop::Crop));
        manipulators.insert("shearv", Box::new(shear::ShearVertical));
        manipulators.insert("shearh", Box::new(shear::ShearHorizontal));
        manipulators.insert("facecrop", Box::new(facecrop::FaceCrop));
        manipulators.insert("paste", Box::new(paste::Paste));
        manipulators.insert("brightness", Box::new(adjust::Brightness));
        manipulators.insert("contrast", Box::new(adjust::Contrast));

        ManipulatorRegistry { manipulators }
    }

    pub fn by_name(&self, name: &str) -> Option<&dyn Manipulator> {
        self.manipulators.get(name).map(|m| m.as_ref())
    }
}

impl Default for ManipulatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contains_all_operators() {
        let registry = ManipulatorRegistry::new();
        for name in [
            "output",
            "rotate",
            "flipv",
            "fliph",
            "resize",
            "fit",
            "crop",
            "shearv",
            "shearh",
            "facecrop",
            "paste",
            "brightness",
            "contrast",
        ] {
            assert!(registry.by_name(name).is_some(), "missing operator {}", name);
        }
        assert!(registry.by_name("sparkle").is_none());
    }
}
