//! Similarity error types.

use thiserror::Error;

/// Errors that can occur while building or consuming a similarity
/// matrix.
#[derive(Debug, Error)]
pub enum SimilarityError {
    /// Reference and query vector sets disagree on dimensionality.
    /// Checked before any per-pair computation; fatal, no partial
    /// matrix is ever produced.
    #[error("Dimension mismatch: reference is {reference}-dimensional, query is {query}-dimensional")]
    DimensionMismatch { reference: usize, query: usize },

    /// A labeled set's ids and vectors differ in length.
    #[error("Label mismatch: {ids} ids for {vectors} vectors")]
    LabelMismatch { ids: usize, vectors: usize },
}
