//! Labeled vector sets and the all-pairs similarity matrix.

use serde::Serialize;
use tracing::debug;

use techsim_embeddings::Embedding;
use techsim_types::TextRecord;

use crate::error::SimilarityError;

/// An ordered vector set labeled by entity ids.
///
/// Ids and vectors are parallel: position `i` of each belongs to the
/// same entity. Input order is preserved all the way into the matrix,
/// so downstream consumers can join results back to source records
/// without re-deriving order.
#[derive(Debug, Clone)]
pub struct LabeledVectors {
    ids: Vec<String>,
    vectors: Vec<Embedding>,
}

impl LabeledVectors {
    /// Pair ids with vectors. Fails if the lengths differ.
    pub fn new(ids: Vec<String>, vectors: Vec<Embedding>) -> Result<Self, SimilarityError> {
        if ids.len() != vectors.len() {
            return Err(SimilarityError::LabelMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
            });
        }
        Ok(Self { ids, vectors })
    }

    /// Pair records with the vectors the engine produced for them, in
    /// the same order.
    pub fn from_records(
        records: &[TextRecord],
        vectors: Vec<Embedding>,
    ) -> Result<Self, SimilarityError> {
        let ids = records.iter().map(|r| r.entity_id.clone()).collect();
        Self::new(ids, vectors)
    }

    /// Number of labeled vectors.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Entity ids in input order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Vectors in input order.
    pub fn vectors(&self) -> &[Embedding] {
        &self.vectors
    }

    /// Dimensionality of the set, `None` when empty.
    ///
    /// Vectors within one set share a dimension by the engine's
    /// contract; the first vector speaks for all of them.
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.first().map(|v| v.dimension())
    }
}

/// All-pairs cosine similarity between a reference and a query set.
///
/// Rows follow reference input order, columns follow query input
/// order; labels are the original entity ids. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityMatrix {
    row_ids: Vec<String>,
    col_ids: Vec<String>,
    /// Row-major: `values[row * col_ids.len() + col]`
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// Number of rows (reference entities).
    pub fn rows(&self) -> usize {
        self.row_ids.len()
    }

    /// Number of columns (query entities).
    pub fn cols(&self) -> usize {
        self.col_ids.len()
    }

    /// Whether the matrix has no cells (either side was empty).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reference entity ids, in input order.
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Query entity ids, in input order.
    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    /// Cell value by position.
    pub fn value_at(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows() && col < self.cols() {
            Some(self.values[row * self.cols() + col])
        } else {
            None
        }
    }

    /// Cell value by entity ids.
    pub fn get(&self, row_id: &str, col_id: &str) -> Option<f32> {
        let row = self.row_ids.iter().position(|id| id == row_id)?;
        let col = self.col_ids.iter().position(|id| id == col_id)?;
        self.value_at(row, col)
    }

    /// One reference row across all queries.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row < self.rows() {
            let cols = self.cols();
            Some(&self.values[row * cols..(row + 1) * cols])
        } else {
            None
        }
    }
}

/// Compute the full pairwise cosine similarity matrix between a
/// reference and a query vector set.
///
/// - Either side empty: a well-formed empty matrix (zero rows or zero
///   columns), not an error.
/// - Dimensionality disagreement between the sets: fails with
///   `DimensionMismatch` before any per-pair computation.
/// - Zero-norm vectors score `0.0` against everything, never a
///   division fault.
///
/// Naive `O(R * Q * D)`; corpus sizes here make the dense-matmul
/// formulation unnecessary.
pub fn compare(
    reference: &LabeledVectors,
    query: &LabeledVectors,
) -> Result<SimilarityMatrix, SimilarityError> {
    if let (Some(d_ref), Some(d_query)) = (reference.dimension(), query.dimension()) {
        if d_ref != d_query {
            return Err(SimilarityError::DimensionMismatch {
                reference: d_ref,
                query: d_query,
            });
        }
    }

    let mut values = Vec::with_capacity(reference.len() * query.len());
    for ref_vector in reference.vectors() {
        for query_vector in query.vectors() {
            values.push(ref_vector.cosine(query_vector));
        }
    }

    debug!(
        rows = reference.len(),
        cols = query.len(),
        "Built similarity matrix"
    );

    Ok(SimilarityMatrix {
        row_ids: reference.ids().to_vec(),
        col_ids: query.ids().to_vec(),
        values,
    })
}
