//! Data types for parent documents, child chunks, and index hits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Free-form document metadata (source path, timestamp, type tag, ...).
pub type Metadata = HashMap<String, String>;

/// Raw input to ingestion: already-extracted plain text plus metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewDocument {
    /// The plain text to ingest.
    pub text: String,
    /// Metadata copied onto every parent document produced from this input.
    pub metadata: Metadata,
}

impl NewDocument {
    /// Create an input document with no metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: Metadata::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A coarse text unit returned to callers.
///
/// Immutable after creation. Ids are freshly generated on every ingestion, so
/// identical content ingested twice yields two distinct documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParentDocument {
    /// Unique identifier within the parent store.
    pub id: String,
    /// Full text of the parent segment.
    pub text: String,
    /// Metadata inherited from the ingested input.
    pub metadata: Metadata,
}

/// A fine-grained unit used only for similarity search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildChunk {
    /// Unique identifier within the vector index.
    pub id: String,
    /// The id of the owning [`ParentDocument`].
    pub parent_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The embedding computed at ingestion time.
    pub embedding: Vec<f32>,
}

/// A child chunk matched by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// The matched child chunk id.
    pub chunk_id: String,
    /// The parent the chunk belongs to.
    pub parent_id: String,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// A parent document resolved from its best-scoring child.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedParent {
    /// The full parent document.
    pub document: ParentDocument,
    /// Score of the best-matching child of this parent.
    pub score: f32,
}
