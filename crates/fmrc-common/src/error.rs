//! Error types shared by the FMRC inventory crates.

use thiserror::Error;

/// Result type alias using FmrcError.
pub type FmrcResult<T> = Result<T, FmrcError>;

/// Primary error type for collection-level operations.
#[derive(Debug, Error)]
pub enum FmrcError {
    // === Input Errors ===
    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Malformed run summary '{source_name}': {message}")]
    MalformedSummary { source_name: String, message: String },

    #[error("Malformed definition: {0}")]
    MalformedDefinition(String),

    // === Query Errors ===
    #[error("No variable named '{0}' in collection")]
    UnknownVariable(String),

    #[error("Offset hour {0} is not part of the collection")]
    UnknownOffset(f64),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FmrcError {
    /// True for errors caused by a single bad input that can be skipped.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FmrcError::MalformedSummary { .. } | FmrcError::InvalidTime(_)
        )
    }
}

impl From<std::io::Error> for FmrcError {
    fn from(err: std::io::Error) -> Self {
        FmrcError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FmrcError {
    fn from(err: serde_json::Error) -> Self {
        FmrcError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<crate::time::TimeParseError> for FmrcError {
    fn from(err: crate::time::TimeParseError) -> Self {
        FmrcError::InvalidTime(err.to_string())
    }
}
