//! Text records: the unit of input to the embedding pipeline.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// One labeled unit of text to be embedded.
///
/// A record is either a technique description (reference collection)
/// or a synthetic sample (query collection). The `entity_id` must be
/// non-empty and unique within its collection; `content` may be empty
/// (the backend decides what an empty string embeds to).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    /// Identifier unique within the record's collection (e.g., "T1566")
    pub entity_id: String,
    /// Human-readable label (e.g., technique name)
    pub label: String,
    /// The text to embed
    pub content: String,
}

impl TextRecord {
    /// Create a new text record.
    pub fn new(
        entity_id: impl Into<String>,
        label: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Validate a collection of records: every `entity_id` non-empty and
/// unique within the collection.
///
/// An empty collection is valid (it produces an empty result
/// downstream, not an error).
pub fn validate_collection(records: &[TextRecord]) -> Result<(), TypesError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    for record in records {
        if record.entity_id.is_empty() {
            return Err(TypesError::InvalidRecord(format!(
                "empty entity_id (label: {:?})",
                record.label
            )));
        }
        if !seen.insert(record.entity_id.as_str()) {
            return Err(TypesError::InvalidRecord(format!(
                "duplicate entity_id: {}",
                record.entity_id
            )));
        }
    }
    Ok(())
}
