//! Vector index trait for child-chunk similarity search.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{ChildChunk, IndexHit};
use crate::error::Result;

/// One stored entry of a vector index.
///
/// Placeholder entries carry no parent reference. They keep the index
/// structurally non-empty before any real content arrives and never appear
/// in query results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Child chunk id (or placeholder id).
    pub id: String,
    /// Owning parent id; `None` for placeholders.
    pub parent_id: Option<String>,
    /// Child chunk text.
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// Whether this entry is a seed placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl From<ChildChunk> for IndexEntry {
    fn from(chunk: ChildChunk) -> Self {
        Self {
            id: chunk.id,
            parent_id: Some(chunk.parent_id),
            text: chunk.text,
            embedding: chunk.embedding,
        }
    }
}

/// Full serializable state of a vector index, entries in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexSnapshot {
    /// Established dimensionality, `None` while the index has never held an entry.
    pub dimensions: Option<usize>,
    /// Entries in insertion order.
    pub entries: Vec<IndexEntry>,
}

/// An embedding-keyed nearest-neighbor index over child chunks.
///
/// The first stored entry fixes the dimensionality for the lifetime of the
/// index; later embeddings of another length are rejected with
/// [`MemoryError::DimensionMismatch`](crate::MemoryError::DimensionMismatch)
/// without touching existing entries.
///
/// # Example
///
/// ```rust,ignore
/// use mentor_memory::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.add(chunk).await?;
/// let hits = index.query(&query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert a chunk, overwriting any entry with the same id in place.
    async fn add(&self, chunk: ChildChunk) -> Result<()> {
        self.add_batch(vec![chunk]).await
    }

    /// Insert several chunks. Either all are stored or, on a dimension
    /// mismatch, none are.
    async fn add_batch(&self, chunks: Vec<ChildChunk>) -> Result<()>;

    /// Return at most `k` hits ordered by descending similarity, ties broken
    /// by insertion order (earliest first).
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Store a placeholder entry if the index holds nothing yet.
    ///
    /// Returns `true` if a placeholder was added.
    async fn initialize_empty(&self, placeholder_text: &str, embedding: Vec<f32>) -> Result<bool>;

    /// Remove every chunk belonging to `parent_id`, returning how many were removed.
    async fn remove_parent(&self, parent_id: &str) -> Result<usize>;

    /// Distinct parent ids referenced by stored chunks.
    async fn parent_ids(&self) -> HashSet<String>;

    /// Number of stored entries, placeholders included.
    async fn len(&self) -> usize;

    /// Whether the index holds no entries at all.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Established dimensionality, if any.
    async fn dimensions(&self) -> Option<usize>;

    /// Capture the full state for persistence.
    async fn snapshot(&self) -> IndexSnapshot;

    /// Replace the full state from a snapshot.
    async fn restore(&self, snapshot: IndexSnapshot) -> Result<()>;
}
