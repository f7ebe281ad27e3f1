//! The corpus provider trait.

use techsim_types::TextRecord;

use crate::error::CorpusError;

/// Supplies the two labeled text collections the pipeline compares.
///
/// The source (relational store, file, API) is opaque to the core.
/// Implementations must return collections that pass
/// `techsim_types::validate_collection`: non-empty entity ids, unique
/// within each collection. Empty collections are valid and produce
/// empty results downstream.
pub trait CorpusProvider {
    /// The reference collection: technique descriptions.
    fn fetch_reference_texts(&self) -> Result<Vec<TextRecord>, CorpusError>;

    /// The query collection: texts to score against the reference.
    fn fetch_query_texts(&self) -> Result<Vec<TextRecord>, CorpusError>;
}
