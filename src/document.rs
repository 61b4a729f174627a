//! Documents stored in a collection and the hits returned by a search.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a document. Random 128-bit (UUID v4) unless supplied by the caller.
pub type DocumentId = Uuid;

/// A piece of text together with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, fixed once assigned.
    pub id: DocumentId,

    /// Arbitrary text payload.
    pub text: String,

    /// Embedding computed by the caller.
    pub embedding: Vec<f32>,
}

impl Document {
    /// Create a document with a freshly generated identifier.
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self::with_id(Uuid::new_v4(), text, embedding)
    }

    /// Create a document with the given identifier.
    pub fn with_id(id: DocumentId, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Document {
            id,
            text: text.into(),
            embedding,
        }
    }
}

/// A ranked hit produced by [`crate::collection::Collection::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocumentId,
    pub text: String,
    /// Cosine similarity against the query, in `[-1, 1]`.
    pub score: f32,
}
