//! Frame clarity scoring.

use image::DynamicImage;
use imageproc::filter::laplacian_filter;

use super::thermal::to_grayscale;

/// Divisor applied to the raw Laplacian variance.
pub const CLARITY_SCALE: f64 = 1000.0;

/// Sharpness of an image: variance of the 4-neighbour Laplacian of its
/// grayscale, divided by [`CLARITY_SCALE`].
///
/// Flat images score 0; blurry or hazy footage scores low.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn clarity_score(image: &DynamicImage) -> f64 {
    let gray = to_grayscale(&image.to_rgb8());
    if gray.width() == 0 || gray.height() == 0 {
        return 0.0;
    }

    let laplacian = laplacian_filter(&gray);
    let count = laplacian.pixels().len();

    let values = laplacian.pixels().map(|p| f64::from(p[0]));
    let mean = values.clone().sum::<f64>() / count as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    variance / CLARITY_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_flat_image_scores_zero() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([40, 90, 160])));
        assert!(clarity_score(&image).abs() < f64::EPSILON);
    }

    #[test]
    fn test_detail_scores_higher_than_blur() {
        let sharp = RgbImage::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let soft = image::imageops::blur(&sharp, 3.0);

        let sharp_score = clarity_score(&DynamicImage::ImageRgb8(sharp));
        let soft_score = clarity_score(&DynamicImage::ImageRgb8(soft));

        assert!(sharp_score > soft_score);
        assert!(sharp_score > 0.0);
    }

    #[test]
    fn test_empty_image_scores_zero() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(clarity_score(&image).abs() < f64::EPSILON);
    }
}
