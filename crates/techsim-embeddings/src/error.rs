//! Embedding error types.
//!
//! The variants mirror the recovery policy the caller is expected to
//! apply: backend failures are retriable at the caller's discretion,
//! dimension mismatches are fatal, storage failures degrade to
//! in-memory-only caching, and cancellation is not a failure at all.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedding backend could not be reached or failed to run.
    /// The engine never retries internally; retry policy is the
    /// caller's decision.
    #[error("Embedding backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A vector's dimensionality disagreed with the backend's declared
    /// dimension. Configuration or programmer error; not retriable.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The durable cache file is missing, unreadable, or corrupt.
    /// Recoverable: fall back to recomputing embeddings.
    #[error("Durable cache unavailable: {0}")]
    StorageUnavailable(String),

    /// Writing the durable cache file failed. Recoverable: the
    /// in-memory cache for the current run is unaffected.
    #[error("Durable cache write failed: {0}")]
    StorageWrite(String),

    /// The caller's cancellation signal was observed between backend
    /// calls. Cache entries already computed are retained.
    #[error("Encoding cancelled")]
    Cancelled,

    /// Candle model error (MiniLM backend)
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error (MiniLM backend)
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Model file download failed (MiniLM backend)
    #[error("Failed to download model: {0}")]
    Download(String),

    /// Model file missing or invalid (MiniLM backend)
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
