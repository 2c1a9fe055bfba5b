//! Exact-size image resampling.

use image::RgbaImage;
use image::imageops::{self, FilterType};

/// Resize `image` to exactly `width` x `height` with bilinear filtering.
///
/// Aspect ratio is not preserved. The result is deterministic for a given input.
pub fn resample(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if width == 0 || height == 0 || image.width() == 0 || image.height() == 0 {
        return RgbaImage::new(width, height);
    }
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}
