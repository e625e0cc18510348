//! Image loading, letterboxing, tensor conversion, and saving utilities.

mod letterbox;
mod load;
mod save;

pub use letterbox::{fit_within, letterbox, CropBox, Letterboxed};
pub use load::{decode_image, image_to_tensor, load_image};
pub use save::{encode_png, save_image, tensor_to_image};

use ndarray::Array4;

/// Image tensor in NCHW format (batch, channels, height, width).
/// Values are normalized to [0, 1] on the way in; generator output is
/// tanh-bounded to (-1, 1).
pub type ImageTensor = Array4<f32>;

/// Side length of the square canvas the generator runs on.
pub const CANVAS_SIZE: u32 = 256;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;
