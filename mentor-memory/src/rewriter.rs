//! Standalone query rewriting from conversation history.

use std::sync::Arc;

use tracing::debug;

use crate::document::RetrievedParent;
use crate::error::Result;
use crate::generation::{GenerationProvider, GenerationRequest};
use crate::history::ConversationHistory;
use crate::retriever::HierarchicalRetriever;

/// Instruction appended after the history and the new question.
pub const DEFAULT_REWRITE_INSTRUCTION: &str =
    "Rephrase the question above into a standalone search query based on the history.";

/// Turns a follow-up question into a self-contained search query.
///
/// With an empty history the question is returned unchanged and the model is
/// not called.
pub struct HistoryAwareRewriter {
    generator: Arc<dyn GenerationProvider>,
    instruction: String,
}

impl HistoryAwareRewriter {
    /// Create a rewriter using [`DEFAULT_REWRITE_INSTRUCTION`].
    pub fn new(generator: Arc<dyn GenerationProvider>) -> Self {
        Self { generator, instruction: DEFAULT_REWRITE_INSTRUCTION.to_string() }
    }

    /// Replace the rewrite instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Produce a standalone query for `question` given `history`.
    ///
    /// A blank model reply falls back to the raw question.
    pub async fn rewrite(&self, history: &ConversationHistory, question: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let request = GenerationRequest::new()
            .history(history.messages())
            .human(question)
            .system(&self.instruction);
        let rewritten = self.generator.generate(&request).await?;
        let rewritten = rewritten.trim();

        if rewritten.is_empty() {
            debug!(provider = self.generator.name(), "empty rewrite, using raw question");
            return Ok(question.to_string());
        }
        debug!(question, standalone = rewritten, "rewrote question");
        Ok(rewritten.to_string())
    }

    /// Rewrite, then retrieve parents for the standalone query.
    ///
    /// Returns the standalone query alongside the retrieved parents.
    pub async fn retrieve(
        &self,
        retriever: &HierarchicalRetriever,
        history: &ConversationHistory,
        question: &str,
        k: usize,
    ) -> Result<(String, Vec<RetrievedParent>)> {
        let standalone = self.rewrite(history, question).await?;
        let parents = retriever.retrieve_scored(&standalone, k).await?;
        Ok((standalone, parents))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::MemoryError;
    use crate::history::Role;

    #[derive(Default)]
    struct RecordingGenerator {
        reply: String,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl GenerationProvider for RecordingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl GenerationProvider for FailingGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            Err(MemoryError::provider("failing", "offline"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn empty_history_passes_question_through() {
        let generator = Arc::new(RecordingGenerator::default());
        let rewriter = HistoryAwareRewriter::new(generator.clone());
        let out = rewriter.rewrite(&ConversationHistory::default(), "and then?").await.unwrap();
        assert_eq!(out, "and then?");
        assert!(generator.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_sent_before_question_and_instruction() {
        let generator = Arc::new(RecordingGenerator {
            reply: "  what did I write about my sister in July  ".into(),
            ..Default::default()
        });
        let rewriter = HistoryAwareRewriter::new(generator.clone());
        let mut history = ConversationHistory::default();
        history.push_exchange("What happened in July?", "You argued with your sister.");

        let out = rewriter.rewrite(&history, "Why?").await.unwrap();
        assert_eq!(out, "what did I write about my sister in July");

        let requests = generator.requests.lock().unwrap();
        let roles: Vec<Role> = requests[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Human, Role::Assistant, Role::Human, Role::System]);
        assert_eq!(requests[0].messages[3].content, DEFAULT_REWRITE_INSTRUCTION);
    }

    #[tokio::test]
    async fn blank_reply_falls_back_to_question() {
        let generator = Arc::new(RecordingGenerator { reply: "\n".into(), ..Default::default() });
        let rewriter = HistoryAwareRewriter::new(generator);
        let mut history = ConversationHistory::default();
        history.push_exchange("hi", "hello");
        assert_eq!(rewriter.rewrite(&history, "Why?").await.unwrap(), "Why?");
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let rewriter = HistoryAwareRewriter::new(Arc::new(FailingGenerator));
        let mut history = ConversationHistory::default();
        history.push_exchange("hi", "hello");
        let err = rewriter.rewrite(&history, "Why?").await.unwrap_err();
        assert!(matches!(err, MemoryError::ProviderFailure { .. }));
    }
}
