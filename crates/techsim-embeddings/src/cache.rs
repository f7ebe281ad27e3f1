//! Content-addressed vector cache.
//!
//! Keys are derived from `(collection identity, content)` so cache
//! reuse follows the text itself, not its position in the input:
//! reordering or deduplicating a collection never causes a miss for
//! repeated text, and changed text always produces a fresh key. A
//! changed content therefore never reads a stale vector; entries are
//! never mutated in place.
//!
//! The cache is in-memory for the process lifetime. Persistence is
//! opt-in: one JSON file per collection identity, with the model name
//! and dimension recorded in the header and verified on load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::model::Embedding;

/// Durable cache file format version.
pub const CACHE_FILE_VERSION: u32 = 1;

/// Cache key: collection identity plus BLAKE3 digest of the content.
///
/// The collection component namespaces identical text appearing in
/// both the reference and query collections, so the two never share
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    collection: String,
    digest: String,
}

impl CacheKey {
    fn derive(collection: &str, content: &str) -> Self {
        Self {
            collection: collection.to_string(),
            digest: blake3::hash(content.as_bytes()).to_hex().to_string(),
        }
    }
}

/// On-disk representation of one collection's cached vectors.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    model: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    /// content digest (hex) -> vector
    entries: HashMap<String, Vec<f32>>,
}

/// Summary of a durable cache file's header.
#[derive(Debug, Clone)]
pub struct CacheFileInfo {
    /// Model that produced the cached vectors
    pub model: String,
    /// Vector dimensionality
    pub dimension: usize,
    /// Number of cached vectors
    pub entries: usize,
    /// When the file was written
    pub created_at: DateTime<Utc>,
}

/// In-memory vector cache keyed by `(collection, content)`.
///
/// Safe under concurrent writers: distinct keys never collide, and a
/// duplicate-key race resolves last-write-wins, which is harmless
/// since both writers computed the same vector for the same content.
#[derive(Debug, Default)]
pub struct VectorCache {
    entries: RwLock<HashMap<CacheKey, Vec<f32>>>,
}

impl VectorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the vector cached for `(collection, content)`.
    ///
    /// Pure read: identical arguments return the same stored vector
    /// until the entry is overwritten or the cache cleared.
    pub fn lookup(&self, collection: &str, content: &str) -> Option<Embedding> {
        let key = CacheKey::derive(collection, content);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&key).map(|v| Embedding::new(v.clone()))
    }

    /// Store a vector for `(collection, content)`, overwriting any
    /// prior entry for that key.
    pub fn store(&self, collection: &str, content: &str, embedding: &Embedding) {
        let key = CacheKey::derive(collection, content);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, embedding.values().to_vec());
    }

    /// Total number of cached vectors across all collections.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached vectors belonging to one collection.
    pub fn collection_len(&self, collection: &str) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().filter(|k| k.collection == collection).count()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Restore one collection's entries from a durable cache file.
    ///
    /// A missing, unreadable, or corrupt file fails with
    /// `StorageUnavailable`; the caller falls back to recomputation.
    /// The header must match the active backend: a file written by a
    /// different model, or at a different dimension, is just as
    /// unusable as a corrupt one and fails the same way, so stale
    /// vectors never masquerade as cache hits. Entries whose dimension
    /// disagrees with the file header are treated as corruption, not
    /// silently skipped.
    ///
    /// Returns the number of entries restored.
    pub fn load(
        &self,
        path: &Path,
        collection: &str,
        model: &str,
        dimension: usize,
    ) -> Result<usize, EmbeddingError> {
        let file = Self::read_cache_file(path)?;

        if file.model != model {
            return Err(EmbeddingError::StorageUnavailable(format!(
                "{}: cache written by model {:?}, backend is {:?}",
                path.display(),
                file.model,
                model
            )));
        }

        if file.dimension != dimension {
            return Err(EmbeddingError::StorageUnavailable(format!(
                "{}: cache dimension {} does not match backend dimension {}",
                path.display(),
                file.dimension,
                dimension
            )));
        }

        for vector in file.entries.values() {
            if vector.len() != file.dimension {
                return Err(EmbeddingError::StorageUnavailable(format!(
                    "{}: entry dimension {} disagrees with header {}",
                    path.display(),
                    vector.len(),
                    file.dimension
                )));
            }
        }

        let count = file.entries.len();
        {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            for (digest, vector) in file.entries {
                entries.insert(
                    CacheKey {
                        collection: collection.to_string(),
                        digest,
                    },
                    vector,
                );
            }
        }

        info!(
            collection = collection,
            entries = count,
            model = %file.model,
            dim = file.dimension,
            "Restored durable embedding cache"
        );
        Ok(count)
    }

    /// Read a durable cache file's header without restoring entries.
    pub fn inspect(path: &Path) -> Result<CacheFileInfo, EmbeddingError> {
        let file = Self::read_cache_file(path)?;
        Ok(CacheFileInfo {
            model: file.model,
            dimension: file.dimension,
            entries: file.entries.len(),
            created_at: file.created_at,
        })
    }

    fn read_cache_file(path: &Path) -> Result<CacheFile, EmbeddingError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EmbeddingError::StorageUnavailable(format!("{}: {}", path.display(), e))
        })?;

        let file: CacheFile = serde_json::from_str(&raw).map_err(|e| {
            EmbeddingError::StorageUnavailable(format!("{}: {}", path.display(), e))
        })?;

        if file.version != CACHE_FILE_VERSION {
            return Err(EmbeddingError::StorageUnavailable(format!(
                "{}: unsupported cache version {}",
                path.display(),
                file.version
            )));
        }

        Ok(file)
    }

    /// Persist one collection's entries to a durable cache file.
    ///
    /// I/O failure surfaces as `StorageWrite`; the in-memory cache is
    /// unaffected. Returns the number of entries written.
    pub fn save(
        &self,
        path: &Path,
        collection: &str,
        model: &str,
        dimension: usize,
    ) -> Result<usize, EmbeddingError> {
        let file = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            CacheFile {
                version: CACHE_FILE_VERSION,
                model: model.to_string(),
                dimension,
                created_at: Utc::now(),
                entries: entries
                    .iter()
                    .filter(|(k, _)| k.collection == collection)
                    .map(|(k, v)| (k.digest.clone(), v.clone()))
                    .collect(),
            }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EmbeddingError::StorageWrite(format!("{}: {}", parent.display(), e)))?;
        }

        let json = serde_json::to_string(&file)
            .map_err(|e| EmbeddingError::StorageWrite(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            EmbeddingError::StorageWrite(format!("{}: {}", path.display(), e))
        })?;

        debug!(
            collection = collection,
            entries = file.entries.len(),
            path = %path.display(),
            "Saved durable embedding cache"
        );
        Ok(file.entries.len())
    }
}
