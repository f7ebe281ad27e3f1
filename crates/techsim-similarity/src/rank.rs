//! Per-query ranking over a similarity matrix.
//!
//! The reporter-facing shape: for each query sample, the k reference
//! techniques it most resembles, best first. Ties break toward the
//! earlier reference in input order so reports are reproducible.

use serde::Serialize;

use crate::matrix::SimilarityMatrix;

/// One reference match for a query.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Match {
    /// Reference entity id (e.g., technique id)
    pub reference_id: String,
    /// Cosine similarity score
    pub score: f32,
}

/// Ranked matches for one query entity.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryRanking {
    /// Query entity id (e.g., sample id)
    pub query_id: String,
    /// Top matches, best first
    pub matches: Vec<Match>,
}

/// Rank the top `k` reference matches for every query column.
///
/// Output follows query input order. A matrix with zero rows yields a
/// ranking with no matches per query; a matrix with zero columns
/// yields no rankings.
pub fn top_k(matrix: &SimilarityMatrix, k: usize) -> Vec<QueryRanking> {
    matrix
        .col_ids()
        .iter()
        .enumerate()
        .map(|(col, query_id)| {
            let mut scored: Vec<(usize, f32)> = matrix
                .row_ids()
                .iter()
                .enumerate()
                .map(|(row, _)| {
                    // Indices are in range by construction.
                    (row, matrix.value_at(row, col).unwrap_or(0.0))
                })
                .collect();

            // Descending score, then ascending reference position.
            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            scored.truncate(k);

            QueryRanking {
                query_id: query_id.clone(),
                matches: scored
                    .into_iter()
                    .map(|(row, score)| Match {
                        reference_id: matrix.row_ids()[row].clone(),
                        score,
                    })
                    .collect(),
            }
        })
        .collect()
}
