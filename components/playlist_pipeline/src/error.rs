// components/playlist_pipeline/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// One backend failed or does not recognize the reference.
    #[error("{source_name} could not resolve playlist: {reason}")]
    Resolution { source_name: String, reason: String },

    #[error("No source matched the playlist reference: {0}")]
    NoSourceMatched(String),

    #[error("Failed to fetch {locator}: {reason}")]
    Fetch { locator: String, reason: String },

    #[error("Failed to transcode {output}: {reason}")]
    Transcode { output: PathBuf, reason: String },

    #[error("A download batch is already in progress")]
    BatchAlreadyActive,

    #[error("No tracks selected for download")]
    EmptySelection,

    #[error("No destination directory available")]
    DestinationUnavailable,

    #[error("Batch was cancelled")]
    Cancelled,

    #[error("Required dependency not found: {0}")]
    DependencyNotFound(&'static str),

    #[error("Preference store error: {0}")]
    Preferences(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn resolution(source_name: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Resolution {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch(locator: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Fetch {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transcode(output: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::Transcode {
            output: output.into(),
            reason: reason.to_string(),
        }
    }

    pub fn preferences(reason: impl ToString) -> Self {
        PipelineError::Preferences(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
