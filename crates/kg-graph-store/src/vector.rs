//! Vector collections for semantic search over code, documentation, and
//! test entities (spec §4.4 "manage vector indexes for three collections").

use serde::{Deserialize, Serialize};

/// Dimensionality required of every embedding in every collection (spec
/// §4.4 "1536-dim cosine distance").
pub const VECTOR_DIMENSIONS: usize = 1536;

/// The three vector collections the graph store maintains (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorCollection {
    /// Embeddings of code symbols (functions, classes, modules).
    Code,
    /// Embeddings of documentation nodes.
    Documentation,
    /// Embeddings of test descriptions/bodies.
    Tests,
}

impl VectorCollection {
    /// All three collections, in a stable order.
    #[must_use]
    pub fn all() -> [VectorCollection; 3] {
        [Self::Code, Self::Documentation, Self::Tests]
    }
}

/// A single vector entry keyed by the entity id it embeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// The entity id this embedding represents.
    pub entity_id: String,
    /// The embedding, must have length [`VECTOR_DIMENSIONS`].
    pub embedding: Vec<f32>,
    /// Arbitrary payload carried alongside the vector (e.g. a text snippet).
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Error returned when an embedding's dimensionality does not match
/// [`VECTOR_DIMENSIONS`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("embedding has {actual} dimensions, expected {VECTOR_DIMENSIONS}")]
pub struct DimensionMismatch {
    /// The embedding's actual length.
    pub actual: usize,
}

impl VectorRecord {
    /// Construct a vector record, validating its dimensionality.
    pub fn new(
        entity_id: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Result<Self, DimensionMismatch> {
        if embedding.len() != VECTOR_DIMENSIONS {
            return Err(DimensionMismatch {
                actual: embedding.len(),
            });
        }
        Ok(Self {
            entity_id: entity_id.into(),
            embedding,
            payload: serde_json::Map::new(),
        })
    }
}

/// A scored vector search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    /// The matched entity id.
    pub entity_id: String,
    /// Cosine similarity score; higher is more similar.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_dimensionality() {
        let err = VectorRecord::new("entity:a", vec![0.0; 10]).unwrap_err();
        assert_eq!(err.actual, 10);
    }

    #[test]
    fn accepts_correct_dimensionality() {
        let record = VectorRecord::new("entity:a", vec![0.0; VECTOR_DIMENSIONS]).unwrap();
        assert_eq!(record.embedding.len(), VECTOR_DIMENSIONS);
    }

    #[test]
    fn all_collections_are_distinct() {
        let all = VectorCollection::all();
        assert_eq!(all.len(), 3);
    }
}
