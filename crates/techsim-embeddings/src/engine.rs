//! Cache-first embedding engine.
//!
//! `encode` turns an ordered text collection into an ordered vector
//! collection through the configured backend, consulting the vector
//! cache before every backend call. Backend failures abort the call
//! but keep whatever the cache already holds, so a retry only pays for
//! the texts that never completed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use techsim_types::TextRecord;

use crate::cache::VectorCache;
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingBackend};

/// Cooperative cancellation signal.
///
/// Cloned tokens share state. The engine checks the token between
/// backend calls, never inside one, so a single backend invocation is
/// the cancellation latency floor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Counters from one `encode` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EncodeStats {
    /// Texts served from the cache
    pub cache_hits: usize,
    /// Texts sent to the backend
    pub backend_calls: usize,
}

/// Embedding engine: pluggable backend plus shared vector cache.
///
/// All model configuration lives in the backend instance handed in at
/// construction; the engine carries no ambient state of its own, so
/// two engines over the same cache and backend behave identically.
pub struct EmbeddingEngine {
    backend: Arc<dyn EmbeddingBackend>,
    cache: Arc<VectorCache>,
}

impl EmbeddingEngine {
    /// Create an engine over a backend and a (possibly shared) cache.
    pub fn new(backend: Arc<dyn EmbeddingBackend>, cache: Arc<VectorCache>) -> Self {
        Self { backend, cache }
    }

    /// The cache this engine consults and populates.
    pub fn cache(&self) -> &VectorCache {
        &self.cache
    }

    /// The backend's declared dimensionality.
    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    /// Encode an ordered text collection into vectors, same length and
    /// order as the input.
    ///
    /// Per text: cache hit -> stored vector; miss -> exactly one
    /// backend invocation, result stored under `(collection, content)`.
    /// Given a fixed backend and cache state this is a pure function of
    /// the text sequence; reordering the input reorders the output
    /// identically without changing any vector.
    ///
    /// Failure modes:
    /// - backend error -> `BackendUnavailable`, call aborted, cache
    ///   entries from earlier texts kept
    /// - vector dimension disagreeing with the backend's declared
    ///   dimension -> `DimensionMismatch`
    /// - `cancel` observed before a backend call -> `Cancelled`, cache
    ///   entries from earlier texts kept
    pub fn encode<S: AsRef<str>>(
        &self,
        collection: &str,
        texts: &[S],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        let (vectors, stats) = self.encode_with_stats(collection, texts, cancel)?;
        debug!(
            collection = collection,
            hits = stats.cache_hits,
            backend_calls = stats.backend_calls,
            "Encoded collection"
        );
        Ok(vectors)
    }

    /// `encode`, also returning hit/call counters.
    pub fn encode_with_stats<S: AsRef<str>>(
        &self,
        collection: &str,
        texts: &[S],
        cancel: Option<&CancelToken>,
    ) -> Result<(Vec<Embedding>, EncodeStats), EmbeddingError> {
        let expected = self.backend.dimension();
        let mut vectors = Vec::with_capacity(texts.len());
        let mut stats = EncodeStats::default();

        for text in texts {
            let text = text.as_ref();

            if let Some(cached) = self.cache.lookup(collection, text) {
                if cached.dimension() != expected {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        actual: cached.dimension(),
                    });
                }
                vectors.push(cached);
                stats.cache_hits += 1;
                continue;
            }

            if let Some(token) = cancel {
                if token.is_cancelled() {
                    warn!(
                        collection = collection,
                        completed = vectors.len(),
                        total = texts.len(),
                        "Encoding cancelled; cached progress retained"
                    );
                    return Err(EmbeddingError::Cancelled);
                }
            }

            let embedding = self.backend.embed(text).map_err(|e| match e {
                EmbeddingError::BackendUnavailable(_)
                | EmbeddingError::DimensionMismatch { .. } => e,
                other => EmbeddingError::BackendUnavailable(other.to_string()),
            })?;
            stats.backend_calls += 1;

            if embedding.dimension() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: embedding.dimension(),
                });
            }

            self.cache.store(collection, text, &embedding);
            vectors.push(embedding);
        }

        Ok((vectors, stats))
    }

    /// Encode the `content` field of each record, in record order.
    pub fn encode_records(
        &self,
        collection: &str,
        records: &[TextRecord],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        let texts: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        self.encode(collection, &texts, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BackendInfo;
    use std::sync::atomic::AtomicUsize;

    /// Deterministic backend that counts invocations and can be told
    /// to fail from the Nth call onward.
    struct CountingBackend {
        info: BackendInfo,
        calls: AtomicUsize,
        fail_from_call: Option<usize>,
    }

    impl CountingBackend {
        fn new(dimension: usize) -> Self {
            Self {
                info: BackendInfo {
                    name: "counting".to_string(),
                    dimension,
                    max_sequence_length: 256,
                },
                calls: AtomicUsize::new(0),
                fail_from_call: None,
            }
        }

        fn failing_from(dimension: usize, call: usize) -> Self {
            let mut backend = Self::new(dimension);
            backend.fail_from_call = Some(call);
            backend
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Text-derived vector: byte sums folded into the dimensions.
        fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut values = vec![0.0f32; self.info.dimension];
            for (i, byte) in text.bytes().enumerate() {
                values[i % self.info.dimension] += byte as f32;
            }
            values
        }
    }

    impl EmbeddingBackend for CountingBackend {
        fn info(&self) -> &BackendInfo {
            &self.info
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(fail_from) = self.fail_from_call {
                if call >= fail_from {
                    return Err(EmbeddingError::BackendUnavailable(
                        "model offline".to_string(),
                    ));
                }
            }
            Ok(Embedding::new(self.vector_for(text)))
        }
    }

    fn engine_with(backend: CountingBackend) -> (EmbeddingEngine, Arc<VectorCache>) {
        let cache = Arc::new(VectorCache::new());
        let engine = EmbeddingEngine::new(Arc::new(backend), Arc::clone(&cache));
        (engine, cache)
    }

    #[test]
    fn test_encode_preserves_length_and_order() {
        let (engine, _) = engine_with(CountingBackend::new(4));
        let texts = ["alpha", "beta", "gamma"];

        let vectors = engine.encode("ref", &texts, None).unwrap();

        assert_eq!(vectors.len(), 3);
        // Each output position corresponds to its input text.
        for (text, vector) in texts.iter().zip(&vectors) {
            let direct = engine.cache().lookup("ref", text).unwrap();
            assert_eq!(*vector, direct);
        }
    }

    #[test]
    fn test_encode_empty_input_is_empty_output() {
        let (engine, _) = engine_with(CountingBackend::new(4));
        let vectors = engine.encode::<&str>("ref", &[], None).unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_repeat_encode_is_bitwise_identical_and_cached() {
        let (engine, _) = engine_with(CountingBackend::new(8));
        let texts = ["phishing email with malicious link"];

        let first = engine.encode("ref", &texts, None).unwrap();
        let (second, stats) = engine.encode_with_stats("ref", &texts, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.backend_calls, 0);
    }

    #[test]
    fn test_duplicate_text_hits_cache_within_one_call() {
        let (engine, _) = engine_with(CountingBackend::new(4));
        let texts = ["same", "same", "same"];

        let (vectors, stats) = engine.encode_with_stats("ref", &texts, None).unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(stats.backend_calls, 1);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(vectors[1], vectors[2]);
    }

    #[test]
    fn test_reordered_input_reorders_output_identically() {
        let (engine, _) = engine_with(CountingBackend::new(4));
        let forward = ["one", "two", "three"];
        let reversed = ["three", "two", "one"];

        let a = engine.encode("ref", &forward, None).unwrap();
        let b = engine.encode("ref", &reversed, None).unwrap();

        assert_eq!(a[0], b[2]);
        assert_eq!(a[1], b[1]);
        assert_eq!(a[2], b[0]);
    }

    #[test]
    fn test_backend_failure_preserves_partial_cache() {
        let texts = ["t1", "t2", "t3", "t4", "t5"];

        // First attempt: backend dies on its 3rd call.
        let cache = Arc::new(VectorCache::new());
        let engine = EmbeddingEngine::new(
            Arc::new(CountingBackend::failing_from(4, 3)),
            Arc::clone(&cache),
        );
        let err = engine.encode("ref", &texts, None).unwrap_err();
        assert!(matches!(err, EmbeddingError::BackendUnavailable(_)));
        assert_eq!(cache.collection_len("ref"), 2);

        // Retry with a working backend over the same cache: only the
        // three unfinished texts reach the backend.
        let retry_backend = Arc::new(CountingBackend::new(4));
        let engine = EmbeddingEngine::new(
            Arc::clone(&retry_backend) as Arc<dyn EmbeddingBackend>,
            Arc::clone(&cache),
        );
        let vectors = engine.encode("ref", &texts, None).unwrap();

        assert_eq!(vectors.len(), 5);
        assert_eq!(retry_backend.calls(), 3);
        assert_eq!(cache.collection_len("ref"), 5);
    }

    #[test]
    fn test_cancellation_between_backend_calls() {
        let cache = Arc::new(VectorCache::new());
        // Pre-cache the first text so the engine starts with a hit.
        cache.store("ref", "cached", &Embedding::new(vec![0.0; 4]));

        let engine =
            EmbeddingEngine::new(Arc::new(CountingBackend::new(4)), Arc::clone(&cache));

        let token = CancelToken::new();
        token.cancel();

        let err = engine
            .encode("ref", &["cached", "fresh"], Some(&token))
            .unwrap_err();

        // Cached text was served; the backend call for "fresh" never
        // happened; prior cache entries survive.
        assert!(matches!(err, EmbeddingError::Cancelled));
        assert!(cache.lookup("ref", "cached").is_some());
        assert!(cache.lookup("ref", "fresh").is_none());
    }

    #[test]
    fn test_not_cancelled_token_is_inert() {
        let (engine, _) = engine_with(CountingBackend::new(4));
        let token = CancelToken::new();
        let vectors = engine.encode("ref", &["a", "b"], Some(&token)).unwrap();
        assert_eq!(vectors.len(), 2);
    }

    /// Backend that declares one dimension and produces another.
    struct LyingBackend {
        info: BackendInfo,
    }

    impl EmbeddingBackend for LyingBackend {
        fn info(&self) -> &BackendInfo {
            &self.info
        }

        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            Ok(Embedding::new(vec![1.0, 2.0]))
        }
    }

    #[test]
    fn test_backend_dimension_disagreement_is_dimension_mismatch() {
        let backend = LyingBackend {
            info: BackendInfo {
                name: "lying".to_string(),
                dimension: 3,
                max_sequence_length: 16,
            },
        };
        let engine = EmbeddingEngine::new(Arc::new(backend), Arc::new(VectorCache::new()));

        let err = engine.encode("ref", &["text"], None).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_encode_records_uses_content_in_order() {
        let (engine, _) = engine_with(CountingBackend::new(4));
        let records = vec![
            TextRecord::new("T1", "one", "first text"),
            TextRecord::new("T2", "two", "second text"),
        ];

        let vectors = engine.encode_records("ref", &records, None).unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(
            vectors[0],
            engine.cache().lookup("ref", "first text").unwrap()
        );
        assert_eq!(
            vectors[1],
            engine.cache().lookup("ref", "second text").unwrap()
        );
    }

    #[test]
    fn test_empty_content_does_not_crash() {
        let (engine, _) = engine_with(CountingBackend::new(4));
        let vectors = engine.encode("ref", &[""], None).unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].dimension(), 4);
    }
}
