//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mentor_memory::{
    DEFAULT_REWRITE_INSTRUCTION, EmbeddingProvider, GenerationProvider, GenerationRequest,
    HashingEmbeddingProvider, HierarchicalRetriever, InMemoryParentStore, InMemoryVectorIndex,
    MemoryError, ParentDocument, ParentStore, Result, RecursiveSplitter, Role, StoreSnapshot,
};

/// A chat model that answers by request shape: rewrite requests end with the
/// rewrite instruction, evaluation requests start with the quality prompt,
/// everything else is an answer request.
pub struct FakeChat {
    pub answer: String,
    pub rewrite: String,
    pub verdict: String,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeChat {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            rewrite: "standalone query".to_string(),
            verdict: r#"{"follows_guidelines": true, "issues": [], "suggestion": ""}"#.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rewrite(mut self, rewrite: &str) -> Self {
        self.rewrite = rewrite.to_string();
        self
    }

    pub fn with_verdict(mut self, verdict: &str) -> Self {
        self.verdict = verdict.to_string();
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn rewrite_requests(&self) -> Vec<GenerationRequest> {
        self.requests().into_iter().filter(is_rewrite).collect()
    }
}

fn is_rewrite(request: &GenerationRequest) -> bool {
    request
        .messages
        .last()
        .is_some_and(|m| m.role == Role::System && m.content == DEFAULT_REWRITE_INSTRUCTION)
}

fn is_evaluation(request: &GenerationRequest) -> bool {
    request
        .messages
        .first()
        .is_some_and(|m| m.content.starts_with("You are a quality control agent"))
}

#[async_trait]
impl GenerationProvider for FakeChat {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = if is_evaluation(request) {
            &self.verdict
        } else if is_rewrite(request) {
            &self.rewrite
        } else {
            &self.answer
        };
        Ok(reply.clone())
    }

    fn name(&self) -> &str {
        "fake-chat"
    }
}

/// Returns fixed embeddings for known texts and hashes everything else.
pub struct KeyedEmbedder {
    pub known: HashMap<String, Vec<f32>>,
    pub fallback: HashingEmbeddingProvider,
}

impl KeyedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { known: HashMap::new(), fallback: HashingEmbeddingProvider::new(dimensions) }
    }

    pub fn with(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.known.insert(text.to_string(), embedding);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for KeyedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.known.get(text).cloned().unwrap_or_else(|| self.fallback.embed_text(text)))
    }

    fn dimensions(&self) -> usize {
        self.fallback.dimensions()
    }
}

/// An embedder that is always down.
pub struct OfflineEmbedder;

#[async_trait]
impl EmbeddingProvider for OfflineEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(MemoryError::ProviderFailure {
            provider: "offline".to_string(),
            message: "connection refused".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        8
    }
}

/// Hashes like the default embedder but fails on any text containing `poison`.
pub struct PoisonedEmbedder {
    pub poison: String,
    pub inner: HashingEmbeddingProvider,
}

impl PoisonedEmbedder {
    pub fn new(poison: &str) -> Self {
        Self { poison: poison.to_string(), inner: HashingEmbeddingProvider::default() }
    }
}

#[async_trait]
impl EmbeddingProvider for PoisonedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(&self.poison) {
            return Err(MemoryError::ProviderFailure {
                provider: "poisoned".to_string(),
                message: "rejected input".to_string(),
            });
        }
        Ok(self.inner.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// An in-memory parent store whose reads take `delay`.
pub struct SlowParentStore {
    pub inner: InMemoryParentStore,
    pub delay: Duration,
}

impl SlowParentStore {
    pub fn new(delay: Duration) -> Self {
        Self { inner: InMemoryParentStore::new(), delay }
    }
}

#[async_trait]
impl ParentStore for SlowParentStore {
    async fn put(&self, document: ParentDocument) -> Result<()> {
        self.inner.put(document).await
    }

    async fn get(&self, id: &str) -> Result<ParentDocument> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(id).await
    }

    async fn remove(&self, id: &str) -> Option<ParentDocument> {
        self.inner.remove(id).await
    }

    async fn all_ids(&self) -> HashSet<String> {
        self.inner.all_ids().await
    }

    async fn ids_oldest_first(&self) -> Vec<String> {
        self.inner.ids_oldest_first().await
    }

    async fn len(&self) -> usize {
        self.inner.len().await
    }

    async fn dump(&self) -> StoreSnapshot {
        self.inner.dump().await
    }

    async fn load(&self, snapshot: StoreSnapshot) -> Result<()> {
        self.inner.load(snapshot).await
    }
}

/// A retriever over fresh in-memory structures with small splitters.
pub struct Fixture {
    pub retriever: HierarchicalRetriever,
    pub index: Arc<InMemoryVectorIndex>,
    pub store: Arc<InMemoryParentStore>,
}

pub fn fixture(
    embedder: Arc<dyn EmbeddingProvider>,
    parent_size: usize,
    child_size: usize,
) -> Fixture {
    let index = Arc::new(InMemoryVectorIndex::new());
    let store = Arc::new(InMemoryParentStore::new());
    let retriever = HierarchicalRetriever::builder()
        .parent_splitter(Arc::new(RecursiveSplitter::new(parent_size).unwrap()))
        .child_splitter(Arc::new(RecursiveSplitter::new(child_size).unwrap()))
        .embedding_provider(embedder)
        .vector_index(index.clone())
        .parent_store(store.clone())
        .build()
        .unwrap();
    Fixture { retriever, index, store }
}
