//! The conversational memory engine.
//!
//! [`MemoryEngine`] wires the retrieval memory to the ingestion and question
//! paths:
//!
//! - ingestion: split → index → store → snapshot
//! - question: rewrite → retrieve → generate → quality check → remember the
//!   exchange → snapshot → extend the session history
//!
//! Mutations and snapshots run under a single writer lock, so concurrent
//! questions from different sessions never interleave a save with a write.
//!
//! # Example
//!
//! ```rust,ignore
//! use mentor_memory::{MemoryConfig, MemoryEngine, NewDocument};
//!
//! let engine = MemoryEngine::builder()
//!     .config(MemoryConfig::from_env()?)
//!     .embedding_provider(Arc::new(embedder))
//!     .generation_provider(Arc::new(chat))
//!     .open()
//!     .await?;
//!
//! engine.ingest(&[NewDocument::new(journal_text)]).await?;
//! let mut session = engine.new_session();
//! let answer = engine.ask(&mut session, "What did I worry about in July?").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::config::MemoryConfig;
use crate::docstore::{InMemoryParentStore, ParentStore};
use crate::document::NewDocument;
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::eviction::EvictionPolicy;
use crate::generation::{GenerationProvider, GenerationRequest};
use crate::history::ConversationSession;
use crate::index::VectorIndex;
use crate::inmemory::InMemoryVectorIndex;
use crate::persistence::PersistenceManager;
use crate::quality::{QualityGate, QualityPolicy, QualityVerdict};
use crate::retriever::{HierarchicalRetriever, IngestReport};
use crate::rewriter::HistoryAwareRewriter;
use crate::splitter::RecursiveSplitter;

/// Reply required when the question falls outside the ingested material.
pub const OUT_OF_SCOPE_REPLY: &str = "I cannot answer that based on your journals.";

/// Metadata `type` tag given to remembered exchanges.
pub const CONVERSATION_TYPE: &str = "conversation";

fn answer_instruction(language: &str, context: &str) -> String {
    format!(
        "You are a deeply analytical life mentor with a memory of the user's journal entries, \
         yet also a conversational partner. Always engage with the user. If they mention \
         feelings, reflect on them and ask follow-up questions. If they say hello, respond \
         with a warm greeting.\n\n\
         SCOPE:\n\
         - Only answer questions about the user's own journals and uploaded documents.\n\
         - If the question is about anything not in the context below, respond exactly: \
         \"{OUT_OF_SCOPE_REPLY}\"\n\
         - Never invent information or fill gaps with general knowledge.\n\n\
         HOW TO ANSWER:\n\
         1. Be specific: give concrete details, dates, events and thought processes from the journals.\n\
         2. Retell: \"That evening you wrote that...\", not general statements.\n\
         3. Connect the dots: show how one event shaped the user's later thoughts.\n\
         4. Be analytical: explain why things happened based on patterns in the text.\n\
         5. Always answer in {language}, whatever language the user writes in.\n\
         6. Keep the answer under 400 characters.\n\n\
         Context from personal reflections:\n{context}"
    )
}

/// A generated answer and how it was produced.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The generated reply.
    pub text: String,
    /// The standalone query used for retrieval.
    pub standalone_query: String,
    /// Ids of the parent documents used as context, best first.
    pub sources: Vec<String>,
    /// The quality gate's verdict on `text`.
    pub verdict: QualityVerdict,
}

/// Sizes of the live memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    /// Parent documents in the store.
    pub parents: usize,
    /// Index entries, placeholder included.
    pub index_entries: usize,
    /// Established embedding dimensionality.
    pub dimensions: Option<usize>,
}

/// Retrieval memory plus the question pipeline around it.
///
/// Construct one via [`MemoryEngine::builder()`].
pub struct MemoryEngine {
    config: MemoryConfig,
    retriever: HierarchicalRetriever,
    rewriter: HistoryAwareRewriter,
    gate: QualityGate,
    generator: Arc<dyn GenerationProvider>,
    persistence: PersistenceManager,
    write_lock: Mutex<()>,
}

impl MemoryEngine {
    /// Create a new [`MemoryEngineBuilder`].
    pub fn builder() -> MemoryEngineBuilder {
        MemoryEngineBuilder::default()
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn retriever(&self) -> &HierarchicalRetriever {
        &self.retriever
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// Start a conversation with the configured history window.
    pub fn new_session(&self) -> ConversationSession {
        ConversationSession::new(self.config.history_window)
    }

    /// Ingest documents and snapshot the memory before returning.
    pub async fn ingest(&self, documents: &[NewDocument]) -> Result<IngestReport> {
        let _guard = self.write_lock.lock().await;
        let report = self.retriever.add_documents(documents).await?;
        self.save_locked().await?;
        Ok(report)
    }

    /// Answer a question within a session.
    ///
    /// The exchange is stored as a retrievable document and snapshotted
    /// before this returns; only then is it appended to the session history.
    /// A failing quality verdict is logged and attached to the answer, not
    /// turned into an error.
    #[instrument(skip_all, fields(session.id = %session.id()))]
    pub async fn ask(&self, session: &mut ConversationSession, question: &str) -> Result<Answer> {
        let (standalone_query, parents) = self
            .rewriter
            .retrieve(&self.retriever, &session.history, question, self.config.top_k)
            .await?;

        let context =
            parents.iter().map(|p| p.document.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let request = GenerationRequest::new()
            .system(answer_instruction(&self.config.language, &context))
            .history(session.history.messages())
            .human(question);
        let text = self.generator.generate(&request).await.inspect_err(|e| {
            error!(error = %e, "answer generation failed");
        })?;

        let verdict = self.gate.check(question, &text).await?;

        self.remember_exchange(session, question, &text).await?;
        session.history.push_exchange(question, text.clone());

        info!(sources = parents.len(), degraded = verdict.is_degraded(), "question answered");
        Ok(Answer {
            text,
            standalone_query,
            sources: parents.into_iter().map(|p| p.document.id).collect(),
            verdict,
        })
    }

    /// Write a full snapshot of the current memory.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save_locked().await
    }

    pub async fn stats(&self) -> MemoryStats {
        let index = self.retriever.vector_index();
        MemoryStats {
            parents: self.retriever.parent_store().len().await,
            index_entries: index.len().await,
            dimensions: index.dimensions().await,
        }
    }

    async fn remember_exchange(
        &self,
        session: &ConversationSession,
        question: &str,
        answer: &str,
    ) -> Result<()> {
        let now = Local::now();
        let date = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let transcript =
            format!("Datum: {date}\nusers question: {question}\nMentors answer: {answer}");

        let transcript_path = self
            .config
            .write_transcripts
            .then(|| self.transcript_path(&now.format("%Y%m%d_%H%M%S_%3f").to_string()));
        let source = match &transcript_path {
            Some(path) => path.display().to_string(),
            None => format!("session:{}", session.id()),
        };

        let document = NewDocument::new(transcript.clone())
            .with_metadata("source", source)
            .with_metadata("date", date)
            .with_metadata("type", CONVERSATION_TYPE)
            .with_metadata("session", session.id());

        let _guard = self.write_lock.lock().await;
        self.retriever.add_documents(&[document]).await?;
        self.save_locked().await?;

        // Written only once the exchange is in the saved memory.
        if let Some(path) = transcript_path {
            write_transcript(&path, &transcript).await?;
        }
        Ok(())
    }

    fn transcript_path(&self, stamp: &str) -> PathBuf {
        self.config.data_dir.join(format!("chat_{stamp}.txt"))
    }

    async fn save_locked(&self) -> Result<()> {
        self.persistence
            .save_state(
                self.retriever.vector_index().as_ref(),
                self.retriever.parent_store().as_ref(),
            )
            .await
    }
}

async fn write_transcript(path: &std::path::Path, transcript: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(|e| MemoryError::persistence(dir, e))?;
    }
    tokio::fs::write(path, transcript).await.map_err(|e| MemoryError::persistence(path, e))
}

/// Builder for constructing a [`MemoryEngine`].
///
/// The embedding and generation providers are required. The evaluator used
/// by the quality gate defaults to the generation provider.
#[derive(Default)]
pub struct MemoryEngineBuilder {
    config: Option<MemoryConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    evaluator: Option<Arc<dyn GenerationProvider>>,
    quality_policy: Option<QualityPolicy>,
    eviction: Option<Arc<dyn EvictionPolicy>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    parent_store: Option<Arc<dyn ParentStore>>,
}

impl MemoryEngineBuilder {
    /// Set the configuration. Defaults to [`MemoryConfig::default()`].
    pub fn config(mut self, config: MemoryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the model used for rewriting and answering.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Use a separate model for quality evaluation.
    pub fn evaluator(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.evaluator = Some(provider);
        self
    }

    /// Override the quality policy. Defaults to the policy for the configured language.
    pub fn quality_policy(mut self, policy: QualityPolicy) -> Self {
        self.quality_policy = Some(policy);
        self
    }

    /// Set a capacity policy for stored parents.
    pub fn eviction_policy(mut self, policy: Arc<dyn EvictionPolicy>) -> Self {
        self.eviction = Some(policy);
        self
    }

    /// Use a specific vector index instead of a fresh [`InMemoryVectorIndex`].
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Use a specific parent store instead of a fresh [`InMemoryParentStore`].
    pub fn parent_store(mut self, store: Arc<dyn ParentStore>) -> Self {
        self.parent_store = Some(store);
        self
    }

    /// Build the engine and restore its memory from the configured data
    /// directory, seeding an empty index when no snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if a required provider is missing, and
    /// any error from [`PersistenceManager::restore`].
    pub async fn open(self) -> Result<MemoryEngine> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| MemoryError::Config("embedding_provider is required".to_string()))?;
        let generator = self
            .generation_provider
            .ok_or_else(|| MemoryError::Config("generation_provider is required".to_string()))?;
        let evaluator = self.evaluator.unwrap_or_else(|| generator.clone());
        let policy = self
            .quality_policy
            .unwrap_or_else(|| QualityPolicy::default().with_language(config.language.clone()));
        let index = self.vector_index.unwrap_or_else(|| Arc::new(InMemoryVectorIndex::new()));
        let store = self.parent_store.unwrap_or_else(|| Arc::new(InMemoryParentStore::new()));

        let mut retriever = HierarchicalRetriever::builder()
            .parent_splitter(Arc::new(RecursiveSplitter::new(config.parent_chunk_size)?))
            .child_splitter(Arc::new(RecursiveSplitter::new(config.child_chunk_size)?))
            .embedding_provider(embedding_provider.clone())
            .vector_index(index.clone())
            .parent_store(store.clone());
        if let Some(eviction) = self.eviction {
            retriever = retriever.eviction_policy(eviction);
        }
        let retriever = retriever.build()?;

        let persistence = PersistenceManager::from_config(&config);
        persistence
            .restore(
                index.as_ref(),
                store.as_ref(),
                embedding_provider.as_ref(),
                &config.placeholder_text,
            )
            .await?;

        info!(data_dir = %config.data_dir.display(), "memory engine ready");
        Ok(MemoryEngine {
            rewriter: HistoryAwareRewriter::new(generator.clone()),
            gate: QualityGate::new(evaluator).with_policy(policy),
            generator,
            retriever,
            persistence,
            config,
            write_lock: Mutex::new(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_language_and_context() {
        let instruction = answer_instruction("Swedish", "I walked by the sea.");
        assert!(instruction.contains("Always answer in Swedish"));
        assert!(instruction.ends_with("I walked by the sea."));
        assert!(instruction.contains(OUT_OF_SCOPE_REPLY));
    }
}
