//! Embedding value type and the pluggable backend trait.

use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

/// A fixed-length semantic vector for one text.
///
/// Vectors are stored as produced by the backend; no normalization is
/// applied on construction. Cosine similarity divides by the norms, so
/// magnitude never affects scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Wrap a raw vector.
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// The vector's dimensionality.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// The raw vector values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// A unit-length copy. A zero vector is returned unchanged.
    pub fn normalized(&self) -> Embedding {
        let norm = self.norm();
        if norm > 0.0 {
            Embedding::new(self.values.iter().map(|x| x / norm).collect())
        } else {
            self.clone()
        }
    }

    /// Cosine similarity with another embedding, in `[-1, 1]`.
    ///
    /// If either vector has zero norm the result is `0.0` by policy;
    /// there is no similarity direction to speak of and a division
    /// fault would help nobody. Mismatched dimensions also yield `0.0`
    /// here; callers that need a hard failure check dimensions before
    /// comparing (see `techsim-similarity`).
    pub fn cosine(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        let dot: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();
        let denom = self.norm() * other.norm();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}

/// Information a backend declares about itself.
#[derive(Debug, Clone)]
pub struct BackendInfo {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
}

/// The pluggable embedding backend.
///
/// Implementations must be thread-safe (Send + Sync). The engine
/// treats any error from `embed` as the backend being unavailable and
/// aborts the encode call; it never retries.
pub trait EmbeddingBackend: Send + Sync {
    /// Backend metadata
    fn info(&self) -> &BackendInfo;

    /// The fixed dimensionality of every vector this backend produces.
    fn dimension(&self) -> usize {
        self.info().dimension
    }

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed multiple texts. Output order must match input order.
    /// Default implementation calls `embed` per text; backends with
    /// real batching override this.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert!((a.cosine(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.cosine(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = Embedding::new(vec![2.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.cosine(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_symmetry() {
        let a = Embedding::new(vec![0.3, -1.2, 0.7]);
        let b = Embedding::new(vec![1.1, 0.4, -0.5]);
        assert_eq!(a.cosine(&b), b.cosine(&a));
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        let zero = Embedding::new(vec![0.0, 0.0, 0.0]);
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(zero.cosine(&a), 0.0);
        assert_eq!(a.cosine(&zero), 0.0);
        assert_eq!(zero.cosine(&zero), 0.0);
    }

    #[test]
    fn test_cosine_magnitude_independent() {
        let a = Embedding::new(vec![1.0, 1.0]);
        let b = Embedding::new(vec![10.0, 10.0]);
        assert!((a.cosine(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_unit_length() {
        let a = Embedding::new(vec![3.0, 4.0]);
        let n = a.normalized();
        assert!((n.norm() - 1.0).abs() < 1e-6);
        assert!((n.values()[0] - 0.6).abs() < 1e-6);
        assert!((n.values()[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_zero_vector_unchanged() {
        let zero = Embedding::new(vec![0.0, 0.0]);
        assert_eq!(zero.normalized(), zero);
    }
}
