//! Corpus error types.

use thiserror::Error;

use techsim_types::TypesError;

/// Errors raised while fetching text collections.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// The corpus source could not be opened or read.
    #[error("Corpus unavailable: {0}")]
    Unavailable(String),

    /// A fetched record violated a collection invariant (empty or
    /// duplicate entity id).
    #[error("Invalid corpus record: {0}")]
    InvalidRecord(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl From<TypesError> for CorpusError {
    fn from(err: TypesError) -> Self {
        CorpusError::InvalidRecord(err.to_string())
    }
}
