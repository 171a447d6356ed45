//! Identity-keyed storage for parent documents.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::document::ParentDocument;
use crate::error::{MemoryError, Result};

/// Full serializable state of a parent store, documents in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreSnapshot {
    /// Stored documents, oldest first.
    pub documents: Vec<ParentDocument>,
}

/// A store of parent documents keyed by id.
///
/// No size limit and no eviction of its own; removal only happens through an
/// [`EvictionPolicy`](crate::EvictionPolicy) applied by the retriever.
#[async_trait]
pub trait ParentStore: Send + Sync {
    /// Store a document under its id, replacing any document with the same id.
    async fn put(&self, document: ParentDocument) -> Result<()>;

    /// Fetch a document by id.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] if no document has that id.
    async fn get(&self, id: &str) -> Result<ParentDocument>;

    /// Remove a document, returning it if it existed.
    async fn remove(&self, id: &str) -> Option<ParentDocument>;

    /// All stored ids.
    async fn all_ids(&self) -> HashSet<String>;

    /// All stored ids, oldest first.
    async fn ids_oldest_first(&self) -> Vec<String>;

    /// Number of stored documents.
    async fn len(&self) -> usize;

    /// Dump every document for persistence.
    async fn dump(&self) -> StoreSnapshot;

    /// Replace the contents with a previously dumped snapshot.
    async fn load(&self, snapshot: StoreSnapshot) -> Result<()>;
}

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<String, ParentDocument>,
    order: Vec<String>,
}

impl StoreState {
    fn insert(&mut self, document: ParentDocument) {
        if !self.documents.contains_key(&document.id) {
            self.order.push(document.id.clone());
        }
        self.documents.insert(document.id.clone(), document);
    }
}

/// A [`ParentStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryParentStore {
    state: RwLock<StoreState>,
}

impl InMemoryParentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParentStore for InMemoryParentStore {
    async fn put(&self, document: ParentDocument) -> Result<()> {
        self.state.write().await.insert(document);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ParentDocument> {
        self.state
            .read()
            .await
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    async fn remove(&self, id: &str) -> Option<ParentDocument> {
        let mut state = self.state.write().await;
        let removed = state.documents.remove(id)?;
        state.order.retain(|existing| existing != id);
        Some(removed)
    }

    async fn all_ids(&self) -> HashSet<String> {
        self.state.read().await.documents.keys().cloned().collect()
    }

    async fn ids_oldest_first(&self) -> Vec<String> {
        self.state.read().await.order.clone()
    }

    async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    async fn dump(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        let documents =
            state.order.iter().filter_map(|id| state.documents.get(id).cloned()).collect();
        StoreSnapshot { documents }
    }

    async fn load(&self, snapshot: StoreSnapshot) -> Result<()> {
        let mut loaded = StoreState::default();
        for document in snapshot.documents {
            loaded.insert(document);
        }
        *self.state.write().await = loaded;
        Ok(())
    }
}
