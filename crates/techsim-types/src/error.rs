//! Error types shared across the pipeline.

use thiserror::Error;

/// Errors raised by shared types and configuration loading.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record violated a collection invariant
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
