//! Underwater enhancement pipeline.

mod clarity;
mod enhance;
mod thermal;

pub use clarity::{clarity_score, CLARITY_SCALE};
pub use enhance::{Config, EnhancementMode, Enhancer};
pub use thermal::{false_color_edges, to_grayscale};
