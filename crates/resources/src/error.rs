//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    /// The file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The file exists but could not be decoded.
    #[error("Failed to decode image '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The decoded image cannot be used as a texture.
    #[error("Invalid texture '{path}': {reason}")]
    InvalidFormat { path: PathBuf, reason: String },
}

pub type ResourceResult<T> = Result<T, ResourceError>;
