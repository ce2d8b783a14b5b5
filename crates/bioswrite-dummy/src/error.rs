//! Error types for the dummy programmer

use std::path::PathBuf;

use thiserror::Error;

/// Dummy programmer errors
#[derive(Debug, Error)]
pub enum DummyError {
    /// Backing image could not be read
    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing image could not be written
    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing image does not match the emulated chip size
    #[error("Image {path} is {actual} bytes, expected {expected}")]
    ImageSize {
        path: PathBuf,
        actual: usize,
        expected: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for dummy programmer operations
pub type Result<T> = std::result::Result<T, DummyError>;
