//! Image loading utilities.

use std::path::Path;

use image::{DynamicImage, RgbImage};
use ndarray::Array4;

use crate::error::{Error, Result};

use super::{ImageTensor, RGB_CHANNELS};

/// Load an image from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();

    image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode an image from an in-memory buffer (upload body, stream frame).
///
/// The format is guessed from the content.
///
/// # Errors
///
/// Returns an error if the bytes are not a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| Error::ImageDecode { source })
}

/// Convert an RGB image to an NCHW tensor `(1, 3, height, width)`.
///
/// Pixel values are scaled from [0, 255] to [0, 1].
#[must_use]
pub fn image_to_tensor(img: &RgbImage) -> ImageTensor {
    let (width, height) = img.dimensions();

    let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height as usize, width as usize));

    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..RGB_CHANNELS {
            tensor[[0, c, y, x]] = f32::from(pixel[c]) / 255.0;
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tensor_shape() {
        let img = RgbImage::new(100, 40);
        let tensor = image_to_tensor(&img);

        assert_eq!(tensor.shape(), &[1, 3, 40, 100]);
    }

    #[test]
    fn test_normalization_range() {
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(1, 2, Rgb([255, 0, 51]));
        let tensor = image_to_tensor(&img);

        let min = tensor.iter().copied().fold(f32::INFINITY, f32::min);
        let max = tensor.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        assert!(min.abs() < f32::EPSILON);
        assert!((max - 1.0).abs() < f32::EPSILON);
        assert!((tensor[[0, 0, 2, 1]] - 1.0).abs() < f32::EPSILON);
        assert!((tensor[[0, 2, 2, 1]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::ImageDecode { .. }));
    }
}
