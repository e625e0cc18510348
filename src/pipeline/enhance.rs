//! Enhancement pipeline: letterbox, generator inference, crop, resize, and
//! mode-specific post-processing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use burn::backend::ndarray::NdArrayDevice;
use burn::tensor::{Tensor, TensorData};
use image::{imageops, imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

use crate::error::{Error, Result};
use crate::image::{self as img, CANVAS_SIZE, RGB_CHANNELS};
use crate::model::{
    self, Generator, InferenceBackend, ModelStore, ModelType, OnnxUpscaler, SuperResolution,
};

use super::thermal::false_color_edges;

/// Post-processing branch applied after enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnhancementMode {
    /// Return the restored image.
    #[default]
    Normal,
    /// Replace the restored image with a false-color edge map.
    Thermal,
}

impl EnhancementMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Thermal => "thermal",
        }
    }
}

impl fmt::Display for EnhancementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnhancementMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "thermal" => Ok(Self::Thermal),
            other => Err(Error::InvalidParameter {
                name: "mode".to_string(),
                reason: format!("unknown mode {other:?}, expected \"normal\" or \"thermal\""),
            }),
        }
    }
}

/// Configuration for the enhancement pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory searched for model files not given explicitly.
    pub model_dir: PathBuf,

    /// Generator weights. Defaults to `<model_dir>/finetuned_generator.pth`.
    pub generator_file: Option<PathBuf>,

    /// Super-resolution model. Defaults to `<model_dir>/EDSR_x4.onnx`.
    pub upscaler_file: Option<PathBuf>,

    /// Output JPEG quality (1-100).
    pub output_quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: ModelStore::default_dir(),
            generator_file: None,
            upscaler_file: None,
            output_quality: 95,
        }
    }
}

impl Config {
    /// Resolved path of the generator weights.
    #[must_use]
    pub fn generator_path(&self) -> PathBuf {
        self.generator_file
            .clone()
            .unwrap_or_else(|| self.store().path(ModelType::Generator))
    }

    /// Resolved path of the super-resolution model.
    #[must_use]
    pub fn upscaler_path(&self) -> PathBuf {
        self.upscaler_file
            .clone()
            .unwrap_or_else(|| self.store().path(ModelType::SuperResolution))
    }

    fn store(&self) -> ModelStore {
        ModelStore::new(self.model_dir.clone())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }
}

/// Process-wide enhancement handle.
///
/// Built once at startup and passed by reference to every call; the handle is
/// `Send + Sync`. Models are read-only after construction. When the generator
/// failed to load the handle still exists, [`Enhancer::is_model_loaded`]
/// reports `false`, and every [`Enhancer::enhance`] call returns
/// [`Error::ModelUnavailable`].
///
/// The generator is not `Sync`, so forward passes are serialized through a
/// mutex. Letterboxing, resizing and thermal rendering run outside the lock.
pub struct Enhancer {
    generator: Option<Mutex<Generator<InferenceBackend>>>,
    upscaler: Option<Box<dyn SuperResolution>>,
    device: NdArrayDevice,
    load_error: Option<String>,
}

impl fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enhancer")
            .field("model_loaded", &self.is_model_loaded())
            .field("super_resolution", &self.has_super_resolution())
            .field("load_error", &self.load_error)
            .finish_non_exhaustive()
    }
}

impl Enhancer {
    /// Load models as described by `config`.
    ///
    /// Never fails: a generator that cannot be loaded disables enhancement
    /// (the reason is logged and kept in [`Enhancer::load_error`]); a missing
    /// super-resolution model only disables that path.
    #[must_use]
    pub fn load(config: &Config) -> Self {
        let device = NdArrayDevice::default();

        let generator_path = config.generator_path();
        let (generator, load_error) = match model::load_generator(&generator_path, &device) {
            Ok(generator) => {
                tracing::info!("Generator loaded from {}", generator_path.display());
                (Some(Mutex::new(generator)), None)
            }
            Err(err) => {
                tracing::error!("Enhancement disabled: {err}");
                (None, Some(err.to_string()))
            }
        };

        let upscaler_path = config.upscaler_path();
        let upscaler = match OnnxUpscaler::load(&upscaler_path) {
            Ok(upscaler) => {
                tracing::info!("Super-resolution model loaded from {}", upscaler_path.display());
                Some(Box::new(upscaler) as Box<dyn SuperResolution>)
            }
            Err(err) => {
                tracing::warn!("Super-resolution disabled: {err}");
                None
            }
        };

        Self {
            generator,
            upscaler,
            device,
            load_error,
        }
    }

    /// Wrap an already loaded generator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WeightMismatch`] if the generator does not match the
    /// stage tables.
    pub fn new(generator: Generator<InferenceBackend>) -> Result<Self> {
        generator.verify()?;

        Ok(Self {
            generator: Some(Mutex::new(generator)),
            upscaler: None,
            device: NdArrayDevice::default(),
            load_error: None,
        })
    }

    /// A handle with enhancement disabled for `reason`.
    #[must_use]
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self {
            generator: None,
            upscaler: None,
            device: NdArrayDevice::default(),
            load_error: Some(reason.into()),
        }
    }

    /// Attach a super-resolution model.
    #[must_use]
    pub fn with_upscaler(mut self, upscaler: Box<dyn SuperResolution>) -> Self {
        self.upscaler = Some(upscaler);
        self
    }

    /// Whether the generator is loaded and enhancement can run.
    #[must_use]
    pub const fn is_model_loaded(&self) -> bool {
        self.generator.is_some()
    }

    /// Why the generator is not loaded, if it is not.
    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    #[must_use]
    pub const fn has_super_resolution(&self) -> bool {
        self.upscaler.is_some()
    }

    /// Enhance a single image.
    ///
    /// The output always has the input's dimensions. `use_super_resolution`
    /// is ignored in thermal mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelUnavailable`] when the generator (or a requested
    /// super-resolution model) is not loaded, and a processing error for
    /// empty images or inference failures.
    pub fn enhance(
        &self,
        image: &DynamicImage,
        mode: EnhancementMode,
        use_super_resolution: bool,
    ) -> Result<RgbImage> {
        let generator = self.generator.as_ref().ok_or_else(|| Error::ModelUnavailable {
            name: ModelType::Generator.name().to_string(),
        })?;

        let upscaler = if use_super_resolution && mode != EnhancementMode::Thermal {
            let upscaler = self.upscaler.as_deref().ok_or_else(|| Error::ModelUnavailable {
                name: ModelType::SuperResolution.name().to_string(),
            })?;
            Some(upscaler)
        } else {
            None
        };

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::UnsupportedDimensions {
                width,
                height,
                reason: "image has no pixels".to_string(),
            });
        }

        tracing::debug!("Enhancing {width}x{height} image in {mode} mode");

        let boxed = img::letterbox(&rgb, CANVAS_SIZE)?;
        let restored = self.run_generator(generator, &boxed.canvas)?;
        let cropped = boxed.crop_box.crop(&restored)?;

        let resized = match upscaler {
            Some(upscaler) => {
                let upsampled = upscaler.upsample(&cropped)?;
                // Catmull-Rom is the a = -0.5 cubic; OpenCV's INTER_CUBIC uses -0.75.
                imageops::resize(&upsampled, width, height, FilterType::CatmullRom)
            }
            None => imageops::resize(&cropped, width, height, FilterType::Lanczos3),
        };

        Ok(match mode {
            EnhancementMode::Thermal => false_color_edges(&resized),
            EnhancementMode::Normal => resized,
        })
    }

    /// Forward the padded canvas through the generator.
    fn run_generator(
        &self,
        generator: &Mutex<Generator<InferenceBackend>>,
        canvas: &RgbImage,
    ) -> Result<RgbImage> {
        let size = CANVAS_SIZE as usize;
        let expected = [1, RGB_CHANNELS, size, size];

        let tensor = img::image_to_tensor(canvas);
        if tensor.shape() != expected {
            return Err(Error::ShapeMismatch {
                expected: format!("{expected:?}"),
                actual: format!("{:?}", tensor.shape()),
            });
        }

        let data = TensorData::new(tensor.iter().copied().collect::<Vec<f32>>(), expected);
        let input = Tensor::<InferenceBackend, 4>::from_data(data, &self.device);

        let output = {
            let generator = generator.lock().map_err(|_| Error::ModelUnavailable {
                name: format!("{} (poisoned generator)", ModelType::Generator.name()),
            })?;
            generator.forward(input)
        };
        if output.dims() != expected {
            return Err(Error::ShapeMismatch {
                expected: format!("{expected:?}"),
                actual: format!("{:?}", output.dims()),
            });
        }

        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| Error::ShapeMismatch {
                expected: "f32 tensor data".to_string(),
                actual: format!("{err:?}"),
            })?;

        let output = Array4::from_shape_vec(expected, values).map_err(|_| Error::ShapeMismatch {
            expected: format!("{expected:?}"),
            actual: "reshape failed".to_string(),
        })?;

        img::tensor_to_image(&output)
    }
}
