//! Custom error types for netra.

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of an [`Error`], used by callers to pick a response
/// (e.g. service-unavailable vs. bad request).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A model or weight file could not be loaded.
    Load,
    /// A capability was requested while its model is not loaded.
    Unavailable,
    /// A single call failed; process-wide state is unaffected.
    Processing,
}

/// Main error type for the netra library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to decode an in-memory image.
    #[error("failed to decode image: {source}")]
    ImageDecode {
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode an image in memory.
    #[error("failed to encode image: {source}")]
    ImageEncode {
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image dimensions are not supported.
    #[error("unsupported image dimensions {width}x{height}: {reason}")]
    UnsupportedDimensions {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A model file does not exist.
    #[error("model file for {name} not found at {path}")]
    ModelNotFound { name: String, path: PathBuf },

    /// Failed to read or parse the generator weights.
    #[error("failed to load generator weights from {path}: {source}")]
    GeneratorLoad {
        path: PathBuf,
        #[source]
        source: burn::record::RecorderError,
    },

    /// Failed to list the parameters stored in the generator weights.
    #[error("failed to read parameter index from {path}: {source}")]
    WeightIndex {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },

    /// Loaded weights do not match the generator architecture.
    #[error("generator parameter {parameter} mismatch: expected {expected}, got {actual}")]
    WeightMismatch {
        parameter: String,
        expected: String,
        actual: String,
    },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// The requested capability has no loaded model.
    #[error("{name} model is not loaded")]
    ModelUnavailable { name: String },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelNotFound { .. }
            | Self::GeneratorLoad { .. }
            | Self::WeightIndex { .. }
            | Self::WeightMismatch { .. }
            | Self::ModelLoad { .. } => ErrorKind::Load,
            Self::ModelUnavailable { .. } => ErrorKind::Unavailable,
            Self::ImageLoad { .. }
            | Self::ImageDecode { .. }
            | Self::ImageEncode { .. }
            | Self::ImageSave { .. }
            | Self::UnsupportedDimensions { .. }
            | Self::Inference { .. }
            | Self::InvalidParameter { .. }
            | Self::Io(_)
            | Self::ShapeMismatch { .. } => ErrorKind::Processing,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Unavailable`.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unavailable)
    }
}

/// Result type alias for netra operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let unavailable = Error::ModelUnavailable {
            name: "generator".to_string(),
        };
        assert_eq!(unavailable.kind(), ErrorKind::Unavailable);
        assert!(unavailable.is_unavailable());

        let missing = Error::ModelNotFound {
            name: "generator".to_string(),
            path: PathBuf::from("missing.pth"),
        };
        assert_eq!(missing.kind(), ErrorKind::Load);

        let shape = Error::ShapeMismatch {
            expected: "[1, 3, 256, 256]".to_string(),
            actual: "[1, 1, 256, 256]".to_string(),
        };
        assert_eq!(shape.kind(), ErrorKind::Processing);
        assert!(!shape.is_unavailable());
    }

    #[test]
    fn test_unavailable_message() {
        let err = Error::ModelUnavailable {
            name: "enhancement".to_string(),
        };
        assert_eq!(err.to_string(), "enhancement model is not loaded");
    }
}
