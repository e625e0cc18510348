//! # netra
//!
//! Core of an underwater-imagery enhancement tool: a U-Net style generator
//! that restores color and contrast, wrapped in a pipeline that letterboxes
//! the input onto a 256×256 canvas, runs the network, crops the padding back
//! off, resizes to the original size, and optionally super-resolves or
//! renders a thermal-style false-color edge map.
//!
//! Models are loaded once into an [`Enhancer`] and the handle is passed by
//! reference to every call. A missing generator disables enhancement without
//! taking the host process down.
//!
//! ## Example
//!
//! ```no_run
//! use netra::{Config, EnhancementMode, Enhancer};
//!
//! # fn main() -> netra::Result<()> {
//! let enhancer = Enhancer::load(&Config::default());
//! if !enhancer.is_model_loaded() {
//!     eprintln!("enhancement unavailable: {:?}", enhancer.load_error());
//!     return Ok(());
//! }
//!
//! let input = netra::image::load_image("dive.jpg")?;
//! let output = enhancer.enhance(&input, EnhancementMode::Normal, false)?;
//! netra::image::save_image(&output, "dive_enhanced.png", 95)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, ErrorKind, Result};
pub use pipeline::{Config, EnhancementMode, Enhancer};
