//! # techsim-similarity
//!
//! All-pairs cosine similarity between two labeled vector sets.
//!
//! The builder takes a reference collection (technique descriptions)
//! and a query collection (synthetic samples), both as ids paired with
//! embeddings, and produces a labeled similarity matrix plus per-query
//! top-k rankings for downstream reporting.

pub mod error;
pub mod matrix;
pub mod rank;

pub use error::SimilarityError;
pub use matrix::{compare, LabeledVectors, SimilarityMatrix};
pub use rank::{top_k, Match, QueryRanking};
