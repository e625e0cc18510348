//! Letterbox geometry: fit an image onto the square generator canvas and
//! crop the result back to the content region.

use image::{imageops, imageops::FilterType, RgbImage};

use crate::error::{Error, Result};

/// Region of the canvas covered by the original image content.
///
/// Coordinates are half-open: `x0..x1`, `y0..y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl CropBox {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Whether the box is non-empty and lies inside a `size`×`size` canvas.
    #[must_use]
    pub const fn fits(&self, size: u32) -> bool {
        self.x0 < self.x1 && self.y0 < self.y1 && self.x1 <= size && self.y1 <= size
    }

    /// Cut the box out of `canvas`.
    ///
    /// # Errors
    ///
    /// Returns an error if the box does not lie inside the canvas.
    pub fn crop(&self, canvas: &RgbImage) -> Result<RgbImage> {
        let (width, height) = canvas.dimensions();
        if self.x0 >= self.x1 || self.y0 >= self.y1 || self.x1 > width || self.y1 > height {
            return Err(Error::ShapeMismatch {
                expected: format!("crop box inside {width}x{height}"),
                actual: format!("{self:?}"),
            });
        }

        Ok(imageops::crop_imm(canvas, self.x0, self.y0, self.width(), self.height()).to_image())
    }
}

/// A padded canvas plus the placement of the original content.
#[derive(Debug, Clone)]
pub struct Letterboxed {
    pub canvas: RgbImage,
    pub crop_box: CropBox,
}

/// Largest size with the aspect ratio of `width`×`height` that fits inside
/// `target`×`target`.
///
/// The longer side becomes `target`; the shorter side is rounded and never
/// drops below one pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn fit_within(width: u32, height: u32, target: u32) -> (u32, u32) {
    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (u64::from(short) * u64::from(target) + u64::from(long) / 2) / u64::from(long);
        // Safe: short <= long, so scaled <= target
        (scaled as u32).clamp(1, target)
    };

    if width >= height {
        (target, scale(height, width))
    } else {
        (scale(width, height), target)
    }
}

/// Resize `img` to fit inside a black `target`×`target` canvas, centered.
///
/// Offsets use floor division: `(target - content) / 2` on each axis.
///
/// # Errors
///
/// Returns an error for zero-sized images.
pub fn letterbox(img: &RgbImage, target: u32) -> Result<Letterboxed> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: "image has no pixels".to_string(),
        });
    }

    let (content_w, content_h) = fit_within(width, height, target);

    let content = if (content_w, content_h) == (width, height) {
        img.clone()
    } else {
        imageops::resize(img, content_w, content_h, FilterType::CatmullRom)
    };

    let x0 = (target - content_w) / 2;
    let y0 = (target - content_h) / 2;

    let mut canvas = RgbImage::new(target, target);
    imageops::replace(&mut canvas, &content, i64::from(x0), i64::from(y0));

    let crop_box = CropBox {
        x0,
        y0,
        x1: x0 + content_w,
        y1: y0 + content_h,
    };

    tracing::debug!("Letterboxed {width}x{height} -> {content_w}x{content_h} at ({x0}, {y0})");

    Ok(Letterboxed { canvas, crop_box })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_wide_image_placement() {
        let img = RgbImage::new(100, 50);
        let boxed = letterbox(&img, 256).unwrap();

        assert_eq!(
            boxed.crop_box,
            CropBox {
                x0: 0,
                y0: 64,
                x1: 256,
                y1: 192
            }
        );
        assert_eq!(boxed.canvas.dimensions(), (256, 256));
    }

    #[test]
    fn test_tall_image_placement() {
        let img = RgbImage::new(300, 1000);
        let boxed = letterbox(&img, 256).unwrap();

        // 300 * 256 / 1000 = 76.8 -> 77
        assert_eq!(boxed.crop_box.width(), 77);
        assert_eq!(boxed.crop_box.height(), 256);
        assert_eq!(boxed.crop_box.x0, (256 - 77) / 2);
        assert_eq!(boxed.crop_box.y0, 0);
    }

    #[test]
    fn test_crop_box_always_fits() {
        let sizes = [(1, 1), (1, 5000), (5000, 1), (255, 257), (256, 256), (3, 2), (640, 480)];
        for (w, h) in sizes {
            let boxed = letterbox(&RgbImage::new(w, h), 256).unwrap();
            assert!(boxed.crop_box.fits(256), "{w}x{h} -> {:?}", boxed.crop_box);
        }
    }

    #[test]
    fn test_padding_is_black_and_content_is_kept() {
        let img = RgbImage::from_pixel(100, 50, Rgb([200, 100, 50]));
        let boxed = letterbox(&img, 256).unwrap();

        assert_eq!(boxed.canvas.get_pixel(128, 0), &Rgb([0, 0, 0]));
        assert_eq!(boxed.canvas.get_pixel(128, 255), &Rgb([0, 0, 0]));
        assert_eq!(boxed.canvas.get_pixel(128, 128), &Rgb([200, 100, 50]));

        let content = boxed.crop_box.crop(&boxed.canvas).unwrap();
        assert_eq!(content.dimensions(), (256, 128));
        assert!(content.pixels().all(|p| *p == Rgb([200, 100, 50])));
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = letterbox(&RgbImage::new(0, 10), 256).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDimensions { .. }));
    }

    #[test]
    fn test_crop_outside_canvas_rejected() {
        let canvas = RgbImage::new(16, 16);
        let crop_box = CropBox {
            x0: 8,
            y0: 0,
            x1: 20,
            y1: 4,
        };
        assert!(crop_box.crop(&canvas).is_err());
    }
}
