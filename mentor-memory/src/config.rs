//! Configuration for the memory engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// Default parent segment size in characters.
pub const DEFAULT_PARENT_CHUNK_SIZE: usize = 2000;
/// Default child chunk size in characters.
pub const DEFAULT_CHILD_CHUNK_SIZE: usize = 400;
/// Default number of parents returned per retrieval.
pub const DEFAULT_TOP_K: usize = 4;
/// Default number of conversation entries kept (five exchanges).
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Configuration parameters for the memory engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum parent document size in characters.
    pub parent_chunk_size: usize,
    /// Maximum child chunk size in characters.
    pub child_chunk_size: usize,
    /// Number of parent documents to retrieve per question.
    pub top_k: usize,
    /// Number of conversation entries (human or assistant messages) kept per session.
    pub history_window: usize,
    /// Directory holding snapshots and transcripts.
    pub data_dir: PathBuf,
    /// File name of the vector index snapshot inside `data_dir`.
    pub index_file: String,
    /// File name of the parent store snapshot inside `data_dir`.
    pub store_file: String,
    /// Text embedded for the placeholder entry of a fresh index.
    pub placeholder_text: String,
    /// Language answers must be written in.
    pub language: String,
    /// Write every exchange to `chat_<timestamp>.txt` in `data_dir`.
    pub write_transcripts: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            parent_chunk_size: DEFAULT_PARENT_CHUNK_SIZE,
            child_chunk_size: DEFAULT_CHILD_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
            history_window: DEFAULT_HISTORY_WINDOW,
            data_dir: PathBuf::from("data"),
            index_file: "vector_index.json".to_string(),
            store_file: "parent_store.json".to_string(),
            placeholder_text: "Initialisering".to_string(),
            language: "Swedish".to_string(),
            write_transcripts: true,
        }
    }
}

impl MemoryConfig {
    /// Create a new builder for constructing a [`MemoryConfig`].
    pub fn builder() -> MemoryConfigBuilder {
        MemoryConfigBuilder::default()
    }

    /// Defaults overlaid with `MENTOR_*` environment variables.
    ///
    /// Reads `MENTOR_DATA_DIR`, `MENTOR_TOP_K`, `MENTOR_PARENT_CHUNK_SIZE`,
    /// `MENTOR_CHILD_CHUNK_SIZE` and `MENTOR_LANGUAGE`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if a numeric variable does not parse or
    /// the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(dir) = lookup("MENTOR_DATA_DIR") {
            builder = builder.data_dir(dir);
        }
        if let Some(top_k) = parse_var(&lookup, "MENTOR_TOP_K")? {
            builder = builder.top_k(top_k);
        }
        if let Some(size) = parse_var(&lookup, "MENTOR_PARENT_CHUNK_SIZE")? {
            builder = builder.parent_chunk_size(size);
        }
        if let Some(size) = parse_var(&lookup, "MENTOR_CHILD_CHUNK_SIZE")? {
            builder = builder.child_chunk_size(size);
        }
        if let Some(language) = lookup("MENTOR_LANGUAGE") {
            builder = builder.language(language);
        }
        builder.build()
    }

    /// Full path of the vector index snapshot.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    /// Full path of the parent store snapshot.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|e| MemoryError::Config(format!("{key}={raw:?} is not a number: {e}")))
        })
        .transpose()
}

/// Builder for constructing a validated [`MemoryConfig`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigBuilder {
    config: MemoryConfig,
}

impl MemoryConfigBuilder {
    /// Set the parent document size in characters.
    pub fn parent_chunk_size(mut self, size: usize) -> Self {
        self.config.parent_chunk_size = size;
        self
    }

    /// Set the child chunk size in characters.
    pub fn child_chunk_size(mut self, size: usize) -> Self {
        self.config.child_chunk_size = size;
        self
    }

    /// Set the number of parents retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of conversation entries kept per session.
    pub fn history_window(mut self, window: usize) -> Self {
        self.config.history_window = window;
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the vector index snapshot file name.
    pub fn index_file(mut self, name: impl Into<String>) -> Self {
        self.config.index_file = name.into();
        self
    }

    /// Set the parent store snapshot file name.
    pub fn store_file(mut self, name: impl Into<String>) -> Self {
        self.config.store_file = name.into();
        self
    }

    /// Set the placeholder text used to seed a fresh index.
    pub fn placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.config.placeholder_text = text.into();
        self
    }

    /// Set the answer language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    /// Enable or disable transcript files.
    pub fn write_transcripts(mut self, enabled: bool) -> Self {
        self.config.write_transcripts = enabled;
        self
    }

    /// Build the [`MemoryConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if:
    /// - `child_chunk_size == 0`
    /// - `child_chunk_size > parent_chunk_size`
    /// - `top_k == 0`
    /// - `history_window == 0`
    pub fn build(self) -> Result<MemoryConfig> {
        let config = self.config;
        if config.child_chunk_size == 0 {
            return Err(MemoryError::Config("child_chunk_size must be greater than zero".into()));
        }
        if config.child_chunk_size > config.parent_chunk_size {
            return Err(MemoryError::Config(format!(
                "child_chunk_size ({}) must not exceed parent_chunk_size ({})",
                config.child_chunk_size, config.parent_chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(MemoryError::Config("top_k must be greater than zero".into()));
        }
        if config.history_window == 0 {
            return Err(MemoryError::Config("history_window must be greater than zero".into()));
        }
        Ok(config)
    }
}
