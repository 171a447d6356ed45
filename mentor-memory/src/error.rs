//! Error types for the `mentor-memory` crate.

use thiserror::Error;

/// Errors that can occur in memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// An embedding's length differs from the dimensionality established by the index.
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality established by the index.
        expected: usize,
        /// Dimensionality of the rejected embedding.
        actual: usize,
    },

    /// A parent document lookup missed.
    #[error("Parent document not found: {0}")]
    NotFound(String),

    /// The vector index references a parent that the parent store does not hold.
    #[error("Corrupt index: chunk '{chunk_id}' references missing parent '{parent_id}'")]
    CorruptIndex {
        /// The child chunk holding the dangling reference.
        chunk_id: String,
        /// The parent id that could not be resolved.
        parent_id: String,
    },

    /// An embedding or generation call failed.
    #[error("Provider failure ({provider}): {message}")]
    ProviderFailure {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Reading or writing a snapshot artifact failed.
    #[error("Persistence error ({path}): {message}")]
    Persistence {
        /// The artifact path involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MemoryError {
    pub(crate) fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFailure { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn persistence(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::Persistence { path: path.display().to_string(), message: message.to_string() }
    }
}

/// A convenience result type for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
