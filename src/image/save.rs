//! Image saving utilities.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{Error, Result};

use super::{ImageTensor, RGB_CHANNELS};

/// Save an RGB image to disk.
///
/// The format is inferred from the extension; JPEG output uses `quality`
/// (1-100), other formats ignore it.
///
/// # Errors
///
/// Returns an error if the image cannot be saved.
pub fn save_image<P: AsRef<Path>>(img: &RgbImage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            img.write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            img.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

/// Encode an RGB image as PNG bytes.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|source| Error::ImageEncode { source })?;
    Ok(buffer.into_inner())
}

/// Convert a generator output tensor `(1, 3, height, width)` to an RGB image.
///
/// # Errors
///
/// Returns an error if the tensor is not a single 3-channel image.
#[allow(clippy::cast_possible_truncation)]
pub fn tensor_to_image(tensor: &ImageTensor) -> Result<RgbImage> {
    let &[batch, channels, height, width] = tensor.shape() else {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", tensor.ndim()),
        });
    };

    if batch != 1 || channels != RGB_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("[1, {RGB_CHANNELS}, H, W]"),
            actual: format!("{:?}", tensor.shape()),
        });
    }

    // Safe: dimensions came from a u32-sized image
    let mut img = RgbImage::new(width as u32, height as u32);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let (xi, yi) = (x as usize, y as usize);
        *pixel = Rgb([
            to_pixel(tensor[[0, 0, yi, xi]]),
            to_pixel(tensor[[0, 1, yi, xi]]),
            to_pixel(tensor[[0, 2, yi, xi]]),
        ]);
    }

    Ok(img)
}

/// Map an output value to a pixel: clamp to [0, 1], scale by 255, truncate.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixel(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting
    (value.clamp(0.0, 1.0) * 255.0) as u8
}
