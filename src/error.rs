//! Error types for djv_info

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for djv_info operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a [`MetadataProbe`](crate::probe::MetadataProbe)
pub type ProbeError = Error;

/// Main error type for djv_info
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read {path}: {message}")]
    PathUnreadable { path: PathBuf, message: String },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Cannot open image {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("FFprobe not found. Please install FFmpeg and ensure ffprobe is in PATH")]
    FfprobeNotFound,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Build a [`Error::PathUnreadable`] from any displayable cause
    pub fn unreadable(path: impl Into<PathBuf>, cause: impl std::fmt::Display) -> Self {
        Error::PathUnreadable {
            path: path.into(),
            message: cause.to_string(),
        }
    }
}
