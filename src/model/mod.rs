//! Generator network, super-resolution model, and model file handling.

mod generator;
mod loader;
mod upscaler;

pub use generator::{
    DownStageSpec, Generator, HeadSpec, UpStageSpec, DOWN_STAGES, HEAD, KERNEL_SIZE, LEAKY_SLOPE,
    UP_STAGES,
};
pub use loader::{load_generator, load_session, ModelStore, ModelType};
pub use upscaler::{OnnxUpscaler, SuperResolution, UPSCALE_FACTOR};

/// Backend used for generator inference: CPU, no autodiff.
pub type InferenceBackend = burn::backend::NdArray<f32>;
