//! Pipeline error types.

use thiserror::Error;

use facemark_media::MediaError;

pub type RunResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read input {path}: {source}")]
    InputRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Blocking task failed: {0}")]
    Join(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn input_read(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::InputRead {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure is caused by the submitted image itself.
    pub fn is_bad_input(&self) -> bool {
        matches!(self, Self::Media(MediaError::InputDecode(_)))
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}
