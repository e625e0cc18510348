//! Model file resolution and loading.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use ort::session::Session;

use crate::error::{Error, Result};

use super::generator::{Generator, GeneratorRecord, DOWN_STAGES, UP_STAGES};

/// Models used by the enhancement pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Fine-tuned generator weights (PyTorch state dict).
    Generator,
    /// EDSR ×4 super-resolution network (ONNX).
    SuperResolution,
}

impl ModelType {
    /// Get the default filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Generator => "finetuned_generator.pth",
            Self::SuperResolution => "EDSR_x4.onnx",
        }
    }

    /// Human-readable name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Generator => "enhancement",
            Self::SuperResolution => "super-resolution",
        }
    }
}

/// Directory holding the model files.
#[derive(Debug, Clone)]
pub struct ModelStore {
    model_dir: PathBuf,
}

impl ModelStore {
    /// Create a store rooted at `model_dir`.
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// Platform data directory for models:
    /// - Windows: `%APPDATA%\netra\models`
    /// - Linux: `~/.local/share/netra/models`
    /// - macOS: `~/Library/Application Support/netra/models`
    ///
    /// Falls back to `./models` when the platform has no data directory.
    #[must_use]
    pub fn default_dir() -> PathBuf {
        dirs::data_dir().map_or_else(
            || PathBuf::from("models"),
            |base| base.join("netra").join("models"),
        )
    }

    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Path where `model_type` is expected, whether or not it exists.
    #[must_use]
    pub fn path(&self, model_type: ModelType) -> PathBuf {
        self.model_dir.join(model_type.filename())
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

/// Parameters of one batch norm, as named in the state dict.
const NORM_PARAMS: [&str; 4] = ["weight", "bias", "running_mean", "running_var"];

/// Training-time counter stored next to every batch norm; not used for inference.
const NORM_COUNTER: &str = "num_batches_tracked";

/// Load generator weights from a PyTorch state dict.
///
/// Parameter names follow the training code (`down1.model.0.weight`,
/// `up2.model.1.running_var`, `final.2.bias`, ...) and are remapped onto the
/// stage tables. The file must hold exactly the parameters the stage tables
/// call for, and every parameter shape is checked after loading.
///
/// # Errors
///
/// Returns an error if the file is missing, cannot be parsed, or does not
/// match the architecture.
pub fn load_generator<B: Backend>(path: &Path, device: &B::Device) -> Result<Generator<B>> {
    if !path.exists() {
        return Err(Error::ModelNotFound {
            name: ModelType::Generator.name().to_string(),
            path: path.to_path_buf(),
        });
    }

    tracing::info!("Loading generator weights from {}", path.display());

    let tensors = candle_core::pickle::read_pth_tensor_info(path, false, None).map_err(
        |source| Error::WeightIndex {
            path: path.to_path_buf(),
            source,
        },
    )?;
    check_generator_keys(tensors.iter().map(|info| info.name.as_str()))?;

    let record: GeneratorRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(generator_load_args(path), device)
        .map_err(|source| Error::GeneratorLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let generator = Generator::new(device).load_record(record);
    generator.verify()?;

    Ok(generator)
}

/// State-dict names the stage tables call for.
fn expected_generator_keys() -> BTreeSet<String> {
    let norm_keys = |prefix: String| NORM_PARAMS.map(|param| format!("{prefix}.{param}"));

    let mut keys = BTreeSet::new();
    for (i, spec) in DOWN_STAGES.iter().enumerate() {
        let n = i + 1;
        keys.insert(format!("down{n}.model.0.weight"));
        if spec.norm {
            keys.extend(norm_keys(format!("down{n}.model.1")));
        }
    }
    for i in 0..UP_STAGES.len() {
        let n = i + 1;
        keys.insert(format!("up{n}.model.0.weight"));
        keys.extend(norm_keys(format!("up{n}.model.1")));
    }
    keys.insert("final.2.weight".to_string());
    keys.insert("final.2.bias".to_string());

    keys
}

/// Reject state dicts whose parameter names differ from the architecture.
///
/// Batch norm `num_batches_tracked` counters are tolerated; any other
/// unexpected or missing name is a [`Error::WeightMismatch`].
fn check_generator_keys<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut missing = expected_generator_keys();

    for name in names {
        if missing.remove(name) || name.ends_with(&format!(".{NORM_COUNTER}")) {
            continue;
        }
        return Err(Error::WeightMismatch {
            parameter: name.to_string(),
            expected: "no such parameter".to_string(),
            actual: "present in weight file".to_string(),
        });
    }

    match missing.into_iter().next() {
        Some(name) => Err(Error::WeightMismatch {
            parameter: name,
            expected: "present in weight file".to_string(),
            actual: "missing".to_string(),
        }),
        None => Ok(()),
    }
}

/// Key remapping from the training-side module names to [`Generator`] fields.
fn generator_load_args(path: &Path) -> LoadArgs {
    let mut args = LoadArgs::new(path.to_path_buf());

    for i in 0..DOWN_STAGES.len() {
        let n = i + 1;
        args = args
            .with_key_remap(&format!(r"^down{n}\.model\.0\."), &format!("down.{i}.conv."))
            .with_key_remap(&format!(r"^down{n}\.model\.1\."), &format!("down.{i}.norm."));
    }
    for i in 0..UP_STAGES.len() {
        let n = i + 1;
        args = args
            .with_key_remap(&format!(r"^up{n}\.model\.0\."), &format!("up.{i}.conv."))
            .with_key_remap(&format!(r"^up{n}\.model\.1\."), &format!("up.{i}.norm."));
    }

    args.with_key_remap(r"^final\.2\.", "head.")
}

/// Load an ONNX model session.
///
/// # Errors
///
/// Returns an error if the file is missing or the model cannot be loaded.
pub fn load_session(path: &Path, model_type: ModelType) -> Result<Session> {
    if !path.exists() {
        return Err(Error::ModelNotFound {
            name: model_type.name().to_string(),
            path: path.to_path_buf(),
        });
    }

    tracing::info!("Loading {} model from {}", model_type.name(), path.display());

    Session::builder()
        .map_err(|source| Error::ModelLoad {
            name: model_type.filename().to_string(),
            source,
        })?
        .commit_from_file(path)
        .map_err(|source| Error::ModelLoad {
            name: model_type.filename().to_string(),
            source,
        })
}
