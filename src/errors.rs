//! Error types for humidrs operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for humidrs operations
pub type Result<T> = std::result::Result<T, HumidError>;

/// Error type for humidrs operations
#[derive(Error, Debug)]
pub enum HumidError {
    /// Insert or neighbour query failure in the sequence index
    #[error("Index error: {0}")]
    Index(String),

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File open, read or write failure
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// Path to the file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Internal consistency check failed
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl HumidError {
    pub fn invalid_parameter(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { parameter: parameter.to_string(), reason: reason.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
