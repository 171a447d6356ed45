//! Parent/child retrieval.
//!
//! The [`HierarchicalRetriever`] indexes small child chunks for precise
//! similarity matching but answers with the larger parent documents they came
//! from, so callers get enough surrounding context.
//!
//! # Example
//!
//! ```rust,ignore
//! use mentor_memory::{HierarchicalRetriever, InMemoryParentStore, InMemoryVectorIndex, NewDocument};
//!
//! let retriever = HierarchicalRetriever::builder()
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .parent_store(Arc::new(InMemoryParentStore::new()))
//!     .build()?;
//!
//! retriever.add_documents(&[NewDocument::new("The sky is blue.")]).await?;
//! let parents = retriever.retrieve("what color is the sky", 1).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_CHILD_CHUNK_SIZE, DEFAULT_PARENT_CHUNK_SIZE};
use crate::docstore::ParentStore;
use crate::document::{ChildChunk, NewDocument, ParentDocument, RetrievedParent};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::eviction::{EvictionPolicy, Unbounded};
use crate::index::VectorIndex;
use crate::splitter::{RecursiveSplitter, Splitter};

/// Summary of one `add_documents` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Ids of the parent documents created, in input order.
    pub parent_ids: Vec<String>,
    /// Number of child chunks indexed.
    pub child_count: usize,
    /// Parents evicted by the capacity policy after ingestion.
    pub evicted: Vec<String>,
}

/// Composes two splitters, a vector index and a parent store.
///
/// Retrieval and mutation are ordered by an internal read/write lock, so a
/// query never observes a parent evicted between its index lookup and its
/// store fetch.
///
/// Construct one via [`HierarchicalRetriever::builder()`].
pub struct HierarchicalRetriever {
    parent_splitter: Arc<dyn Splitter>,
    child_splitter: Arc<dyn Splitter>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn ParentStore>,
    eviction: Arc<dyn EvictionPolicy>,
    consistency: RwLock<()>,
}

impl HierarchicalRetriever {
    /// Create a new [`HierarchicalRetrieverBuilder`].
    pub fn builder() -> HierarchicalRetrieverBuilder {
        HierarchicalRetrieverBuilder::default()
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Return a reference to the parent store.
    pub fn parent_store(&self) -> &Arc<dyn ParentStore> {
        &self.store
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Ingest documents: split into parents, split parents into children,
    /// embed the children, then store parents and index children.
    ///
    /// Strictly additive apart from the configured eviction policy. Every
    /// parent gets a fresh id, so identical content ingested twice is stored
    /// twice.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ProviderFailure`] if embedding fails (nothing is
    /// written in that case) and [`MemoryError::DimensionMismatch`] if the
    /// embeddings do not fit the index (the new parents are rolled back).
    pub async fn add_documents(&self, documents: &[NewDocument]) -> Result<IngestReport> {
        let mut parents = Vec::new();
        let mut children = Vec::new();

        for input in documents {
            for segment in self.parent_splitter.split(&input.text) {
                let parent = ParentDocument {
                    id: Uuid::new_v4().to_string(),
                    text: segment,
                    metadata: input.metadata.clone(),
                };
                for child_text in self.child_splitter.split(&parent.text) {
                    children.push(ChildChunk {
                        id: Uuid::new_v4().to_string(),
                        parent_id: parent.id.clone(),
                        text: child_text,
                        embedding: Vec::new(),
                    });
                }
                parents.push(parent);
            }
        }

        if parents.is_empty() {
            info!(parent_count = 0, "ingested documents (empty)");
            return Ok(IngestReport::default());
        }

        let texts: Vec<&str> = children.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self
            .embedding_provider
            .embed_batch(&texts)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during ingestion"))?;
        if embeddings.len() != children.len() {
            return Err(MemoryError::provider(
                "embedding",
                format!("expected {} embeddings, got {}", children.len(), embeddings.len()),
            ));
        }
        for (child, embedding) in children.iter_mut().zip(embeddings) {
            child.embedding = embedding;
        }

        let _writer = self.consistency.write().await;
        // Parents go in first so every indexed child resolves.
        let parent_ids: Vec<String> = parents.iter().map(|p| p.id.clone()).collect();
        for parent in parents {
            self.store.put(parent).await?;
        }
        let child_count = children.len();
        if let Err(e) = self.index.add_batch(children).await {
            error!(error = %e, "indexing failed during ingestion, rolling back parents");
            for id in &parent_ids {
                self.store.remove(id).await;
            }
            return Err(e);
        }

        let evicted = self.apply_eviction().await?;

        info!(
            parent_count = parent_ids.len(),
            child_count,
            evicted = evicted.len(),
            "ingested documents"
        );
        Ok(IngestReport { parent_ids, child_count, evicted })
    }

    /// Retrieve up to `k` distinct parent documents for a query.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::CorruptIndex`] if a matched child references a
    /// parent the store does not hold.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ParentDocument>> {
        Ok(self.retrieve_scored(query, k).await?.into_iter().map(|r| r.document).collect())
    }

    /// Like [`retrieve`](Self::retrieve), also returning each parent's best child score.
    pub async fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<RetrievedParent>> {
        let embedding = self
            .embedding_provider
            .embed(query)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during retrieval"))?;

        let _reader = self.consistency.read().await;
        let hits = self.index.query(&embedding, k).await?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for hit in hits {
            if !seen.insert(hit.parent_id.clone()) {
                continue;
            }
            let document = match self.store.get(&hit.parent_id).await {
                Ok(document) => document,
                Err(MemoryError::NotFound(_)) => {
                    error!(
                        chunk.id = %hit.chunk_id,
                        parent.id = %hit.parent_id,
                        "index references missing parent"
                    );
                    return Err(MemoryError::CorruptIndex {
                        chunk_id: hit.chunk_id,
                        parent_id: hit.parent_id,
                    });
                }
                Err(e) => return Err(e),
            };
            results.push(RetrievedParent { document, score: hit.score });
        }

        info!(result_count = results.len(), k, "retrieval completed");
        Ok(results)
    }

    async fn apply_eviction(&self) -> Result<Vec<String>> {
        let ids = self.store.ids_oldest_first().await;
        let victims = self.eviction.select_victims(&ids);
        for id in &victims {
            let removed_children = self.index.remove_parent(id).await?;
            if self.store.remove(id).await.is_none() {
                warn!(parent.id = %id, "eviction selected an unknown parent");
            }
            info!(parent.id = %id, removed_children, "evicted parent");
        }
        Ok(victims)
    }
}

/// Builder for constructing a [`HierarchicalRetriever`].
///
/// The embedding provider, vector index and parent store are required.
/// Splitters default to 2000-character parents and 400-character children;
/// eviction defaults to [`Unbounded`].
#[derive(Default)]
pub struct HierarchicalRetrieverBuilder {
    parent_splitter: Option<Arc<dyn Splitter>>,
    child_splitter: Option<Arc<dyn Splitter>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    store: Option<Arc<dyn ParentStore>>,
    eviction: Option<Arc<dyn EvictionPolicy>>,
}

impl HierarchicalRetrieverBuilder {
    /// Set the splitter producing parent documents.
    pub fn parent_splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.parent_splitter = Some(splitter);
        self
    }

    /// Set the splitter producing child chunks.
    pub fn child_splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.child_splitter = Some(splitter);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the parent store.
    pub fn parent_store(mut self, store: Arc<dyn ParentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a capacity policy for the parent store.
    pub fn eviction_policy(mut self, policy: Arc<dyn EvictionPolicy>) -> Self {
        self.eviction = Some(policy);
        self
    }

    /// Build the [`HierarchicalRetriever`].
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if a required component is missing.
    pub fn build(self) -> Result<HierarchicalRetriever> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| MemoryError::Config("embedding_provider is required".to_string()))?;
        let index = self
            .index
            .ok_or_else(|| MemoryError::Config("vector_index is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| MemoryError::Config("parent_store is required".to_string()))?;
        let parent_splitter = match self.parent_splitter {
            Some(splitter) => splitter,
            None => Arc::new(RecursiveSplitter::new(DEFAULT_PARENT_CHUNK_SIZE)?),
        };
        let child_splitter = match self.child_splitter {
            Some(splitter) => splitter,
            None => Arc::new(RecursiveSplitter::new(DEFAULT_CHILD_CHUNK_SIZE)?),
        };

        Ok(HierarchicalRetriever {
            parent_splitter,
            child_splitter,
            embedding_provider,
            index,
            store,
            eviction: self.eviction.unwrap_or_else(|| Arc::new(Unbounded)),
            consistency: RwLock::new(()),
        })
    }
}
