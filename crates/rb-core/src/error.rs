//! Error types for RelBin

use thiserror::Error;

/// RelBin error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid setup detected before any evaluation: empty frequency range,
    /// too few bins, sample-rate mismatch, missing marginalization prior.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Arrays that must line up element-for-element do not.
    #[error("Shape mismatch in {context}: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Where the arrays were combined.
        context: String,
        /// Length required by the contract.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// Shorthand for [`Error::ShapeMismatch`].
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Error::ShapeMismatch { context: context.into(), expected, actual }
    }
}

/// Fail with [`Error::ShapeMismatch`] unless `actual == expected`.
pub fn ensure_len(context: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::shape(context, expected, actual));
    }
    Ok(())
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
