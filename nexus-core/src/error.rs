//! Error types for nexus-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using nexus-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for nexus storage operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Vector index errors
    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt vector index at {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },
}

impl Error {
    /// Create a corrupt index error
    pub fn corrupt_index(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the filesystem rather than from data
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Whether the vector file is unusable and should be rebuilt from metadata
    pub fn is_unreadable_index(&self) -> bool {
        matches!(self, Self::CorruptIndex { .. } | Self::DimensionMismatch { .. })
    }
}
