use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

use crate::constants::ENGINE_INSTALL_HINT;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(
        "Image engine `{program}` is not available: {reason}; {hint}",
        hint = ENGINE_INSTALL_HINT
    )]
    EngineUnavailable { program: PathBuf, reason: String },

    #[error("Failed to launch `{program}`: {source}")]
    EngineLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`vips {operation}` failed with {status}")]
    EngineFailed {
        operation: String,
        status: ExitStatus,
    },

    #[error("`vips {operation}` timed out after {timeout:?}")]
    EngineTimeout { operation: String, timeout: Duration },

    #[error("Interrupted before completion")]
    Cancelled,

    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Source is neither a file nor a directory: {0}")]
    UnsupportedSourceType(PathBuf),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Output {output} is already written from {first}")]
    OutputConflict { output: PathBuf, first: PathBuf },

    #[error("Invalid file name: {0}")]
    InvalidFileName(PathBuf),

    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ThumbnailError {
    /// Precondition failures abort the whole run; everything else only fails one file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ThumbnailError::EngineUnavailable { .. }
                | ThumbnailError::SourceNotFound(_)
                | ThumbnailError::UnsupportedSourceType(_)
                | ThumbnailError::WalkdirError(_)
                | ThumbnailError::ThreadPool(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;
