//! SDK Error Types
//!
//! Defines error types for the Nexus SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Storage or index error from the core crate
    #[error("storage error: {0}")]
    Storage(#[from] nexus_core::Error),

    /// Embedding backend error
    #[error("embedding error: {message}")]
    Embedding { message: String },

    /// Model invocation error
    #[error("model error: {message}")]
    Model { message: String },

    /// Tool execution error
    #[error("tool error: {message}")]
    Tool { message: String },

    /// Entry not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Invalid operation
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SDKError {
    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a model error
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Create a tool error
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error came from a model backend
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model { .. } | Self::Http(_))
    }

    /// Check if this error came from the filesystem
    pub fn is_io(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Storage(e) => e.is_io(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SDKError::embedding("test error");
        assert!(err.to_string().contains("test error"));
        assert!(!err.is_model());

        let err = SDKError::not_found("Session", "123");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Session"));
        assert!(err.to_string().contains("123"));

        let err = SDKError::model("connection refused");
        assert!(err.is_model());
    }

    #[test]
    fn test_core_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SDKError = nexus_core::Error::from(io).into();
        assert!(err.is_io());
        assert!(err.to_string().starts_with("storage error"));
    }
}
