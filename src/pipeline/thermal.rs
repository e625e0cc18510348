//! Thermal-style false-color edge rendering.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::separable_filter_equal;

/// Separable 5-tap Gaussian kernel (`[1, 4, 6, 4, 1] / 16`).
pub const BLUR_KERNEL: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// Canny hysteresis thresholds.
pub const CANNY_LOW: f32 = 50.0;
pub const CANNY_HIGH: f32 = 150.0;

/// Blend weights: heatmap over grayscale background.
pub const HEATMAP_WEIGHT: f32 = 0.7;
pub const BACKGROUND_WEIGHT: f32 = 0.3;

/// Convert to grayscale with the 0.299 / 0.587 / 0.114 luma weights.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = 0.299_f32.mul_add(
            f32::from(r),
            0.587_f32.mul_add(f32::from(g), 0.114 * f32::from(b)),
        );
        // Safe: clamped to [0, 255] before casting
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Render the edges of `image` as a jet-colored heatmap over its grayscale.
///
/// grayscale → 5×5 Gaussian blur → Canny(50, 150) → jet → `0.7 · heat + 0.3 · gray`.
#[must_use]
pub fn false_color_edges(image: &RgbImage) -> RgbImage {
    let gray = to_grayscale(image);
    let blurred = separable_filter_equal(&gray, &BLUR_KERNEL);
    let edges = canny(&blurred, CANNY_LOW, CANNY_HIGH);

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let heat = jet_bgr(edges.get_pixel(x, y)[0]);
        let background = f32::from(gray.get_pixel(x, y)[0]);
        // Palette channels stay in BGR order; the reference render blends
        // them against the RGB background as-is.
        Rgb(heat.map(|h| blend(h, background)))
    })
}

/// Jet color map entry for `value`, as `[b, g, r]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn jet_bgr(value: u8) -> [u8; 3] {
    let v = f32::from(value) / 255.0;
    let channel = |center: f32| -> u8 {
        let level = (1.5 - 4.0_f32.mul_add(v, -center).abs()).clamp(0.0, 1.0);
        // Safe: level is in [0, 1]
        (level * 255.0).round() as u8
    };
    [channel(1.0), channel(2.0), channel(3.0)]
}

/// Weighted sum with rounding and saturation.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(heat: u8, background: f32) -> u8 {
    let value = HEATMAP_WEIGHT.mul_add(f32::from(heat), BACKGROUND_WEIGHT * background);
    // Safe: clamped to [0, 255] before casting
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet_bgr(0), [128, 0, 0]);
        assert_eq!(jet_bgr(255), [0, 0, 128]);
    }

    #[test]
    fn test_grayscale_weights() {
        let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        assert_eq!(to_grayscale(&image).get_pixel(0, 0)[0], 76);

        let image = RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        assert_eq!(to_grayscale(&image).get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_black_input_has_no_edges() {
        let image = RgbImage::new(64, 48);
        let thermal = false_color_edges(&image);

        assert_eq!(thermal.dimensions(), (64, 48));
        // 0.7 * 128 = 89.6 over a black background
        assert!(thermal.pixels().all(|p| *p == Rgb([90, 0, 0])));
    }

    #[test]
    fn test_flat_gray_has_no_edges() {
        let image = RgbImage::from_pixel(32, 32, Rgb([100, 100, 100]));
        let thermal = false_color_edges(&image);

        // 0.7 * 128 + 0.3 * 100 = 119.6, 0.3 * 100 = 30
        assert!(thermal.pixels().all(|p| *p == Rgb([120, 30, 30])));
    }

    #[test]
    fn test_step_edge_is_highlighted() {
        let image = RgbImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let thermal = false_color_edges(&image);

        // Edge pixels carry the hot end of the palette in the last channel.
        let edge_pixels = thermal.pixels().filter(|p| p[2] > p[0]).count();
        assert!(edge_pixels > 0);
        // Far from the step nothing is marked.
        assert_eq!(thermal.get_pixel(2, 32), &Rgb([90, 0, 0]));
    }
}
