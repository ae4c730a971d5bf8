//! Error types for model management and background removal operations

use std::path::Path;
use thiserror::Error;

/// Result type alias for model management and background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error types for model management and background removal operations
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// The input image does not exist
    #[error("Input not found: {}", .0.display())]
    InputNotFound(std::path::PathBuf),

    /// The input exists but could not be decoded as an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// A model could not be loaded into a session (recoverable through the default model)
    #[error("Model load error for '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    /// The runtime could not be asked for its execution providers
    #[error("Provider detection error: {0}")]
    ProviderDetection(String),

    /// A single model acquisition failed
    #[error("Acquisition of '{model}' failed: {reason}")]
    Acquisition { model: String, reason: String },

    /// The output artifact is missing after it was written
    #[error("Write verification failed: {} was not created", .0.display())]
    WriteVerification(std::path::PathBuf),

    /// Neither the requested model nor the default model could be loaded
    #[error("No usable model: '{requested}' failed ({requested_reason}); default '{fallback}' failed ({fallback_reason})")]
    FatalModelUnavailable {
        requested: String,
        requested_reason: String,
        fallback: String,
        fallback_reason: String,
    },

    /// Input/output errors (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network errors while talking to a model host
    #[error("Network error: {message}: {source}")]
    Network {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Image processing errors outside decoding
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new model load error
    pub fn model_load<M: Into<String>, S: Into<String>>(model: M, reason: S) -> Self {
        Self::ModelLoad {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Create a new acquisition error
    pub fn acquisition<M: Into<String>, S: Into<String>>(model: M, reason: S) -> Self {
        Self::Acquisition {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create a network error with a message and underlying cause
    pub fn network_error<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Network {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Whether this error must terminate the enclosing operation outright
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalModelUnavailable { .. })
    }
}
