//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding, detecting or rendering.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to decode input image: {0}")]
    InputDecode(String),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedOutputFormat(String),

    #[error("Failed to encode output image: {0}")]
    RenderEncode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an input decode error.
    pub fn input_decode(message: impl Into<String>) -> Self {
        Self::InputDecode(message.into())
    }

    /// Create a classifier-unavailable error.
    pub fn classifier_unavailable(message: impl Into<String>) -> Self {
        Self::ClassifierUnavailable(message.into())
    }

    /// Create an unsupported-format error for the given extension.
    pub fn unsupported_format(extension: impl Into<String>) -> Self {
        Self::UnsupportedOutputFormat(extension.into())
    }

    /// Create a render/encode error.
    pub fn render_encode(message: impl Into<String>) -> Self {
        Self::RenderEncode(message.into())
    }
}
