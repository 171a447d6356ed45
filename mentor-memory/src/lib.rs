//! # mentor-memory
//!
//! Long-term conversational memory for a personal journaling mentor.
//!
//! ## Overview
//!
//! Documents are split twice. Coarse *parent* segments are what callers get
//! back; fine *child* chunks are what gets embedded and searched. A query
//! matches children, then resolves and deduplicates their parents. Every
//! answered exchange is fed back in as a new document, so the memory grows
//! with the conversation.
//!
//! - [`RecursiveSplitter`] - separator-hierarchy splitting with a size bound
//! - [`InMemoryVectorIndex`] - cosine-similarity child index
//! - [`InMemoryParentStore`] - id → parent document map
//! - [`HierarchicalRetriever`] - child search, parent resolution
//! - [`HistoryAwareRewriter`] - follow-up question → standalone query
//! - [`QualityGate`] - post-generation policy check that fails open
//! - [`PersistenceManager`] - JSON snapshots written via temp-file rename
//! - [`MemoryEngine`] - the full ingest and question pipeline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mentor_memory::{HashingEmbeddingProvider, MemoryConfig, MemoryEngine, NewDocument};
//!
//! let engine = MemoryEngine::builder()
//!     .config(MemoryConfig::builder().data_dir("data").build()?)
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .generation_provider(chat_model)
//!     .open()
//!     .await?;
//!
//! engine.ingest(&[NewDocument::new("The sky is blue today.")]).await?;
//! let parents = engine.retriever().retrieve("what color is the sky", 1).await?;
//! ```
//!
//! ## Features
//!
//! - `openai` - [`openai::OpenAIEmbeddingProvider`] and
//!   [`openai::OpenAIChatProvider`] over `reqwest`

pub mod config;
pub mod docstore;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod eviction;
pub mod generation;
pub mod hashing;
pub mod history;
pub mod index;
pub mod inmemory;
pub mod persistence;
pub mod quality;
pub mod retriever;
pub mod rewriter;
pub mod splitter;

#[cfg(feature = "openai")]
pub mod openai;

pub use config::{
    DEFAULT_CHILD_CHUNK_SIZE, DEFAULT_HISTORY_WINDOW, DEFAULT_PARENT_CHUNK_SIZE, DEFAULT_TOP_K,
    MemoryConfig, MemoryConfigBuilder,
};
pub use docstore::{InMemoryParentStore, ParentStore, StoreSnapshot};
pub use document::{ChildChunk, IndexHit, Metadata, NewDocument, ParentDocument, RetrievedParent};
pub use embedding::EmbeddingProvider;
pub use engine::{Answer, MemoryEngine, MemoryEngineBuilder, MemoryStats, OUT_OF_SCOPE_REPLY};
pub use error::{MemoryError, Result};
pub use eviction::{EvictionPolicy, MaxParents, Unbounded};
pub use generation::{GenerationProvider, GenerationRequest};
pub use hashing::{DEFAULT_HASHING_DIMENSIONS, HashingEmbeddingProvider};
pub use history::{ChatMessage, ConversationHistory, ConversationSession, Role};
pub use index::{IndexEntry, IndexSnapshot, VectorIndex};
pub use inmemory::{InMemoryVectorIndex, PLACEHOLDER_ID, cosine_similarity};
pub use persistence::{PersistedState, PersistenceManager, RestoreReport};
pub use quality::{
    DEFAULT_REFUSAL, GatePolicy, QualityGate, QualityPolicy, QualityVerdict, Verdict,
    parse_verdict,
};
pub use retriever::{HierarchicalRetriever, HierarchicalRetrieverBuilder, IngestReport};
pub use rewriter::{DEFAULT_REWRITE_INSTRUCTION, HistoryAwareRewriter};
pub use splitter::{RecursiveSplitter, Splitter, split_text};
