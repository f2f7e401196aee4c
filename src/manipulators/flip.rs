//! Flip operators

use super::{Manipulator, ManipulatorContext, Params};
use crate::error::Result;
use async_trait::async_trait;
use image::DynamicImage;

/// Mirrors the image left to right
pub struct FlipHorizontal;

#[async_trait]
impl Manipulator for FlipHorizontal {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        _params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        Ok(img.fliph())
    }
}

/// Mirrors the image top to bottom
pub struct FlipVertical;

#[async_trait]
impl Manipulator for FlipVertical {
    async fn execute(
        &self,
        _ctx: &mut ManipulatorContext<'_>,
        _params: &Params,
        img: DynamicImage,
    ) -> Result<DynamicImage> {
        Ok(img.flipv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manipulators::test_support::{run, test_image};

    #[tokio::test]
    async fn test_fliph_twice_is_identity() {
        let img = test_image(16, 8);
        let original = img.to_rgba8();

        let once = run(&FlipHorizontal, &[], img).await.unwrap();
        let twice = run(&FlipHorizontal, &[], once).await.unwrap();
        assert_eq!(twice.to_rgba8(), original);
    }

    #[tokio::test]
    async fn test_flipv_twice_is_identity() {
        let img = test_image(16, 8);
        let original = img.to_rgba8();

        let once = run(&FlipVertical, &[], img).await.unwrap();
        let twice = run(&FlipVertical, &[], once).await.unwrap();
        assert_eq!(twice.to_rgba8(), original);
    }

    #[tokio::test]
    async fn test_fliph_moves_pixels() {
        let img = test_image(16, 8);
        let left = *img.to_rgba8().get_pixel(0, 0);

        let flipped = run(&FlipHorizontal, &[], img).await.unwrap();
        assert_eq!(*flipped.to_rgba8().get_pixel(15, 0), left);
    }
}
