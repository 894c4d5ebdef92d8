// ============================================================
// Layer 4 — Image Transformation
// ============================================================
// Turns a decoded image + pixel-space box into model input:
//
//   1. convert to RGB8 (drops alpha, expands greyscale)
//   2. resize to a fixed square (size × size)
//   3. scale to [0, 1], then normalise per channel with the
//      ImageNet mean / std
//   4. lay pixels out channel-first (CHW) as f32
//
// The box is divided by the ORIGINAL width / height so it
// ends up in [0, 1] regardless of the resize.
//
// Reference: image crate documentation (imageops::resize)

use image::{imageops::FilterType, DynamicImage, RgbImage};

use crate::domain::record::BoundingBox;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone)]
pub struct Transformation {
    /// Output side length in pixels
    pub size: u32,
    pub mean: [f32; 3],
    pub std:  [f32; 3],
}

impl Transformation {
    pub fn new(size: u32) -> Self {
        Self { size, mean: IMAGENET_MEAN, std: IMAGENET_STD }
    }

    /// Resize + normalise an image into a CHW buffer of
    /// length 3 * size * size.
    pub fn image(&self, img: &DynamicImage) -> Vec<f32> {
        let rgb     = img.to_rgb8();
        let resized = image::imageops::resize(&rgb, self.size, self.size, FilterType::Triangle);
        self.to_chw(&resized)
    }

    /// Normalise a pixel-space box by the source image size.
    pub fn bbox(&self, bbox: BoundingBox, width: u32, height: u32) -> BoundingBox {
        bbox.scale(1.0 / width as f32, 1.0 / height as f32)
    }

    fn to_chw(&self, img: &RgbImage) -> Vec<f32> {
        let (w, h) = img.dimensions();
        let mut out = Vec::with_capacity(3 * (w * h) as usize);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let v = img.get_pixel(x, y)[c] as f32 / 255.0;
                    out.push((v - self.mean[c]) / self.std[c]);
                }
            }
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_output_is_chw_with_requested_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 0, 0])));
        let t   = Transformation::new(8);
        let buf = t.image(&img);
        assert_eq!(buf.len(), 3 * 8 * 8);

        // First plane is red: (1 - mean) / std
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((buf[0] - red).abs() < 1e-5);

        // Second plane (green) starts at 64 and is zero before normalising
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((buf[64] - green).abs() < 1e-5);
    }

    #[test]
    fn test_box_is_normalised_by_source_size() {
        let t = Transformation::new(224);
        let b = t.bbox(BoundingBox::new(50.0, 25.0, 100.0, 50.0), 200, 100);
        assert_eq!(b.to_array(), [0.25, 0.25, 0.5, 0.5]);
    }
}
