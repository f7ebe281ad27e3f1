//! # techsim-embeddings
//!
//! Embedding engine for the technique-similarity pipeline.
//!
//! Converts ordered text collections into ordered vectors through a
//! pluggable backend, with a content-addressed cache so repeated text
//! is never re-encoded:
//! - `EmbeddingBackend`: the pluggable model interface
//! - `VectorCache`: `(collection, content)`-keyed vectors with opt-in
//!   durable save/load
//! - `EmbeddingEngine`: cache-first encoding with cooperative
//!   cancellation
//! - `MiniLmBackend`: local all-MiniLM-L6-v2 inference via Candle
//!   (384 dimensions, no external API)

pub mod cache;
pub mod engine;
pub mod error;
pub mod minilm;
pub mod model;

pub use cache::{CacheFileInfo, VectorCache};
pub use engine::{CancelToken, EmbeddingEngine, EncodeStats};
pub use error::EmbeddingError;
pub use minilm::{MiniLmBackend, ModelFiles, EMBEDDING_DIM, MODEL_FILE_NAMES};
pub use model::{BackendInfo, Embedding, EmbeddingBackend};
