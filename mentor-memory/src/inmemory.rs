//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a brute-force index backed by
//! an insertion-ordered `Vec` protected by a `tokio::sync::RwLock`. Exhaustive
//! scoring keeps results exact and deterministic, which suits the size of a
//! personal memory.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{ChildChunk, IndexHit};
use crate::error::{MemoryError, Result};
use crate::index::{IndexEntry, IndexSnapshot, VectorIndex};

/// Id given to the seed placeholder entry.
pub const PLACEHOLDER_ID: &str = "placeholder-0";

#[derive(Debug, Default)]
struct IndexState {
    dimensions: Option<usize>,
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
}

impl IndexState {
    fn check_dimensions(&self, actual: usize) -> Result<()> {
        match self.dimensions {
            Some(expected) if expected != actual => {
                Err(MemoryError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn upsert(&mut self, entry: IndexEntry) {
        self.dimensions.get_or_insert(entry.embedding.len());
        match self.positions.get(&entry.id) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    fn reindex(&mut self) {
        self.positions =
            self.entries.iter().enumerate().map(|(i, entry)| (entry.id.clone(), i)).collect();
    }
}

/// An in-memory vector index ranking by cosine similarity.
///
/// Overwriting an existing id keeps the entry's original insertion slot, so
/// tie-breaking stays stable across updates.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    state: RwLock<IndexState>,
}

impl InMemoryVectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn add_batch(&self, chunks: Vec<ChildChunk>) -> Result<()> {
        let mut state = self.state.write().await;

        // Validate the whole batch before the first write.
        let expected = state.dimensions.or_else(|| chunks.first().map(|c| c.embedding.len()));
        if let Some(expected) = expected {
            if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != expected) {
                return Err(MemoryError::DimensionMismatch {
                    expected,
                    actual: bad.embedding.len(),
                });
            }
        }

        let count = chunks.len();
        for chunk in chunks {
            state.upsert(chunk.into());
        }
        debug!(count, total = state.entries.len(), "added chunks to index");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let state = self.state.read().await;
        if k == 0 || state.entries.is_empty() {
            return Ok(Vec::new());
        }
        state.check_dimensions(embedding.len())?;

        // `entries` is in insertion order and the sort is stable, so equal
        // scores keep the earliest entry first.
        let mut scored: Vec<IndexHit> = state
            .entries
            .iter()
            .filter_map(|entry| {
                entry.parent_id.as_ref().map(|parent_id| IndexHit {
                    chunk_id: entry.id.clone(),
                    parent_id: parent_id.clone(),
                    score: cosine_similarity(&entry.embedding, embedding),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn initialize_empty(&self, placeholder_text: &str, embedding: Vec<f32>) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.entries.is_empty() {
            return Ok(false);
        }
        state.check_dimensions(embedding.len())?;
        state.upsert(IndexEntry {
            id: PLACEHOLDER_ID.to_string(),
            parent_id: None,
            text: placeholder_text.to_string(),
            embedding,
        });
        debug!(dimensions = ?state.dimensions, "seeded empty index with placeholder");
        Ok(true)
    }

    async fn remove_parent(&self, parent_id: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|entry| entry.parent_id.as_deref() != Some(parent_id));
        let removed = before - state.entries.len();
        if removed > 0 {
            state.reindex();
        }
        Ok(removed)
    }

    async fn parent_ids(&self) -> HashSet<String> {
        let state = self.state.read().await;
        state.entries.iter().filter_map(|entry| entry.parent_id.clone()).collect()
    }

    async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn dimensions(&self) -> Option<usize> {
        self.state.read().await.dimensions
    }

    async fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read().await;
        IndexSnapshot { dimensions: state.dimensions, entries: state.entries.clone() }
    }

    async fn restore(&self, snapshot: IndexSnapshot) -> Result<()> {
        let mut restored = IndexState { dimensions: snapshot.dimensions, ..Default::default() };
        for entry in snapshot.entries {
            restored.check_dimensions(entry.embedding.len())?;
            restored.upsert(entry);
        }
        *self.state.write().await = restored;
        Ok(())
    }
}
