//! # techsim-types
//!
//! Shared domain types for the technique-similarity pipeline.
//!
//! This crate defines the data structures passed between the corpus
//! providers, the embedding engine, and the similarity builder:
//! - `TextRecord`: one labeled unit of text to be embedded
//! - `Settings`: layered configuration for the pipeline
//!
//! ## Usage
//!
//! ```rust
//! use techsim_types::TextRecord;
//!
//! let rec = TextRecord::new("T1566", "Phishing", "Adversaries may send...");
//! assert_eq!(rec.entity_id, "T1566");
//! ```

pub mod config;
pub mod error;
pub mod record;

pub use config::{CorpusSettings, ModelSettings, ReportSettings, Settings};
pub use error::TypesError;
pub use record::{validate_collection, TextRecord};
