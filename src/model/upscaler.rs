//! Super-resolution upsampling backed by an ONNX EDSR ×4 export.

use std::path::Path;
use std::sync::Mutex;

use image::{Rgb, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::{Error, Result};
use crate::image::RGB_CHANNELS;

use super::loader::{self, ModelType};

/// Scale factor of the bundled super-resolution model.
pub const UPSCALE_FACTOR: u32 = 4;

/// A learned upsampler: `upsample(image) -> image`.
pub trait SuperResolution: Send + Sync {
    /// Upsample `image` by [`SuperResolution::scale`].
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn upsample(&self, image: &RgbImage) -> Result<RgbImage>;

    /// Integer scale factor applied by [`SuperResolution::upsample`].
    fn scale(&self) -> u32;
}

/// EDSR ×4 running on ONNX Runtime.
///
/// The model takes an NCHW RGB tensor in [0, 255] and returns the same layout
/// at four times the resolution. Runs are serialized because a session needs
/// exclusive access while executing.
pub struct OnnxUpscaler {
    session: Mutex<Session>,
}

impl OnnxUpscaler {
    /// Load the model from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load(path: &Path) -> Result<Self> {
        let session = loader::load_session(path, ModelType::SuperResolution)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl SuperResolution for OnnxUpscaler {
    fn upsample(&self, image: &RgbImage) -> Result<RgbImage> {
        let input = image_to_array(image);

        let mut session = self.session.lock().map_err(|_| Error::ModelUnavailable {
            name: format!("{} (poisoned session)", ModelType::SuperResolution.name()),
        })?;

        let input_ref =
            TensorRef::from_array_view(&input).map_err(|source| Error::Inference { source })?;

        let outputs = session
            .run(ort::inputs![input_ref])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "upsampled image output".to_string(),
                actual: "no output".to_string(),
            })?;

        let upsampled = extract_array4(&output)?;
        array_to_image(&upsampled)
    }

    fn scale(&self) -> u32 {
        UPSCALE_FACTOR
    }
}

/// RGB image to `(1, 3, H, W)` in [0, 255].
fn image_to_array(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array4::<f32>::zeros((1, RGB_CHANNELS, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..RGB_CHANNELS {
            array[[0, c, y as usize, x as usize]] = f32::from(pixel[c]);
        }
    }

    array
}

/// `(1, 3, H, W)` in [0, 255] to an RGB image, rounding and clamping.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn array_to_image(array: &Array4<f32>) -> Result<RgbImage> {
    let &[1, channels, height, width] = array.shape() else {
        return Err(Error::ShapeMismatch {
            expected: "[1, 3, H, W]".to_string(),
            actual: format!("{:?}", array.shape()),
        });
    };
    if channels != RGB_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: "[1, 3, H, W]".to_string(),
            actual: format!("{:?}", array.shape()),
        });
    }

    // Safe: clamped to [0, 255] before casting
    let value = |c: usize, x: u32, y: u32| -> u8 {
        array[[0, c, y as usize, x as usize]].round().clamp(0.0, 255.0) as u8
    };

    // Safe: dimensions came from the model and fit in u32
    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        Rgb([value(0, x, y), value(1, x, y), value(2, x, y)])
    }))
}

/// Extract a 4D array from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_array4(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    if dims.len() != 4 {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_layout_matches_pixels() {
        let mut image = RgbImage::new(3, 2);
        image.put_pixel(2, 1, Rgb([9, 8, 7]));

        let array = image_to_array(&image);
        assert_eq!(array.shape(), &[1, 3, 2, 3]);
        assert!((array[[0, 0, 1, 2]] - 9.0).abs() < f32::EPSILON);
        assert!((array[[0, 2, 1, 2]] - 7.0).abs() < f32::EPSILON);

        let back = array_to_image(&array).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn test_array_to_image_clamps() {
        let mut array = Array4::<f32>::zeros((1, 3, 1, 1));
        array[[0, 0, 0, 0]] = 300.0;
        array[[0, 1, 0, 0]] = -12.0;
        array[[0, 2, 0, 0]] = 127.6;

        let image = array_to_image(&array).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 0, 128]));
    }

    #[test]
    fn test_array_to_image_rejects_grayscale() {
        let array = Array4::<f32>::zeros((1, 1, 4, 4));
        assert!(array_to_image(&array).is_err());
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxUpscaler::load(&dir.path().join("EDSR_x4.onnx"));
        assert!(matches!(result, Err(Error::ModelNotFound { .. })));
    }
}
