//! Bounded conversation history and per-caller sessions.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_HISTORY_WINDOW;

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions to the model.
    System,
    /// The user.
    Human,
    /// The model.
    Assistant,
}

/// A single plain-text message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// The author of the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// A system instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into() }
    }

    /// A model message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// The most recent messages of a conversation, oldest first.
///
/// Holds at most `capacity` entries; pushing past that drops the oldest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl ConversationHistory {
    /// Create an empty history keeping at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, messages: VecDeque::with_capacity(capacity) }
    }

    /// Append one message, evicting the oldest if full.
    pub fn push(&mut self, message: ChatMessage) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Append a human message followed by the assistant's reply.
    pub fn push_exchange(&mut self, human: impl Into<String>, assistant: impl Into<String>) {
        self.push(ChatMessage::human(human));
        self.push(ChatMessage::assistant(assistant));
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Conversation state owned by one caller (a connection, a user, a REPL).
///
/// Passing the session into each question keeps concurrent conversations
/// from seeing each other's history.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: String,
    /// The session's bounded history.
    pub history: ConversationHistory,
}

impl ConversationSession {
    /// Start a session keeping `history_window` entries.
    pub fn new(history_window: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            history: ConversationHistory::new(history_window),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_entries() {
        let mut history = ConversationHistory::default();
        for i in 0..7 {
            history.push_exchange(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(history.len(), 10);
        let contents: Vec<_> = history.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "a2", "q3", "a3", "q4", "a4", "q5", "a5", "q6", "a6"]);
        assert_eq!(history.messages().next().map(|m| m.role), Some(Role::Human));
    }

    #[test]
    fn single_push_evicts_exactly_one() {
        let mut history = ConversationHistory::new(3);
        for i in 0..4 {
            history.push(ChatMessage::human(i.to_string()));
        }
        let contents: Vec<_> = history.messages().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["1", "2", "3"]);
    }

    #[test]
    fn sessions_have_distinct_ids() {
        let a = ConversationSession::default();
        let b = ConversationSession::default();
        assert_ne!(a.id(), b.id());
        assert!(a.history.is_empty());
        assert_eq!(a.history.capacity(), 10);
    }
}
