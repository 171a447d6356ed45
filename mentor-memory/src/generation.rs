//! Generation provider trait for answer, rewrite and evaluation calls.

use async_trait::async_trait;

use crate::error::Result;
use crate::history::ChatMessage;

/// An ordered list of messages sent to a language model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Messages in prompt order.
    pub messages: Vec<ChatMessage>,
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system instruction.
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    /// Append a user message.
    pub fn human(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::human(content));
        self
    }

    /// Append prior conversation messages.
    pub fn history<'a>(mut self, messages: impl IntoIterator<Item = &'a ChatMessage>) -> Self {
        self.messages.extend(messages.into_iter().cloned());
        self
    }
}

/// A language model returning plain text.
///
/// Used for answers, standalone-query rewriting and quality evaluation.
/// Failures surface as
/// [`MemoryError::ProviderFailure`](crate::MemoryError::ProviderFailure) and
/// are never retried by callers in this crate.
///
/// # Example
///
/// ```rust,ignore
/// use mentor_memory::{GenerationProvider, GenerationRequest};
///
/// let reply = provider
///     .generate(&GenerationRequest::new().system("Be brief.").human("Hello"))
///     .await?;
/// ```
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produce a completion for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// A short name for logs.
    fn name(&self) -> &str;
}
