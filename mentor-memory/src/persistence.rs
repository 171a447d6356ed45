//! Snapshot persistence for the vector index and parent store.
//!
//! Both artifacts are whole-state JSON overwrites. Each is written to a
//! sibling `.tmp` file and renamed over the target, so a crash mid-save
//! leaves the previous snapshot intact rather than a truncated one. The two
//! renames are not atomic together.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::docstore::{ParentStore, StoreSnapshot};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::index::{IndexSnapshot, VectorIndex};

/// Snapshots read back from disk. A `None` field means that artifact has
/// never been written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    /// The vector index snapshot, if present.
    pub index: Option<IndexSnapshot>,
    /// The parent store snapshot, if present.
    pub store: Option<StoreSnapshot>,
}

/// What [`PersistenceManager::restore`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// The index was loaded from a snapshot.
    pub index_restored: bool,
    /// The parent store was loaded from a snapshot.
    pub store_restored: bool,
    /// A placeholder entry was added to an empty index.
    pub seeded: bool,
}

/// Saves and restores the two persisted artifacts.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    index_path: PathBuf,
    store_path: PathBuf,
}

impl PersistenceManager {
    /// Create a manager writing to the given artifact paths.
    pub fn new(index_path: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self { index_path: index_path.into(), store_path: store_path.into() }
    }

    /// Create a manager using the paths from a [`MemoryConfig`].
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.index_path(), config.store_path())
    }

    /// Path of the vector index artifact.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Path of the parent store artifact.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Write full snapshots of both artifacts.
    ///
    /// Idempotent; safe to call after every mutation.
    pub async fn save(&self, index: &IndexSnapshot, store: &StoreSnapshot) -> Result<()> {
        write_atomic(&self.index_path, index).await?;
        write_atomic(&self.store_path, store).await?;
        info!(
            entries = index.entries.len(),
            documents = store.documents.len(),
            "memory saved"
        );
        Ok(())
    }

    /// Snapshot live structures and [`save`](Self::save) them.
    pub async fn save_state(&self, index: &dyn VectorIndex, store: &dyn ParentStore) -> Result<()> {
        let index_snapshot = index.snapshot().await;
        let store_snapshot = store.dump().await;
        self.save(&index_snapshot, &store_snapshot).await
    }

    /// Read both artifacts back.
    pub async fn load(&self) -> Result<PersistedState> {
        Ok(PersistedState {
            index: read_optional(&self.index_path).await?,
            store: read_optional(&self.store_path).await?,
        })
    }

    /// Load persisted state into live structures, falling back to empty
    /// defaults: an index seeded with one placeholder entry and an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Persistence`] for unreadable artifacts and
    /// [`MemoryError::ProviderFailure`] if embedding the placeholder fails.
    pub async fn restore(
        &self,
        index: &dyn VectorIndex,
        store: &dyn ParentStore,
        embedding_provider: &dyn EmbeddingProvider,
        placeholder_text: &str,
    ) -> Result<RestoreReport> {
        let persisted = self.load().await?;
        let mut report = RestoreReport::default();

        if let Some(snapshot) = persisted.store {
            store.load(snapshot).await?;
            report.store_restored = true;
        }
        if let Some(snapshot) = persisted.index {
            index.restore(snapshot).await?;
            report.index_restored = true;
        }
        if index.is_empty().await {
            let embedding = embedding_provider.embed(placeholder_text).await?;
            report.seeded = index.initialize_empty(placeholder_text, embedding).await?;
        }

        let known = store.all_ids().await;
        let dangling = index.parent_ids().await.difference(&known).count();
        if dangling > 0 {
            warn!(dangling, "restored index references parents missing from the store");
        }

        info!(
            index_restored = report.index_restored,
            store_restored = report.store_restored,
            seeded = report.seeded,
            "memory restored"
        );
        Ok(report)
    }
}

async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| MemoryError::persistence(path, e))?;
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(|e| MemoryError::persistence(dir, e))?;
    }

    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, &bytes).await.map_err(|e| MemoryError::persistence(&tmp, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| MemoryError::persistence(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
    Ok(())
}

async fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MemoryError::persistence(path, e)),
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| MemoryError::persistence(path, e))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Metadata, ParentDocument};
    use crate::index::IndexEntry;

    fn populated() -> (IndexSnapshot, StoreSnapshot) {
        let index = IndexSnapshot {
            dimensions: Some(2),
            entries: vec![IndexEntry {
                id: "c1".into(),
                parent_id: Some("p1".into()),
                text: "The sky is blue.".into(),
                embedding: vec![0.5, -0.25],
            }],
        };
        let store = StoreSnapshot {
            documents: vec![ParentDocument {
                id: "p1".into(),
                text: "The sky is blue.".into(),
                metadata: Metadata::from([("type".to_string(), "journal".to_string())]),
            }],
        };
        (index, store)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            PersistenceManager::new(dir.path().join("idx.json"), dir.path().join("store.json"));
        let (index, store) = populated();

        manager.save(&index, &store).await.unwrap();
        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded, PersistedState { index: Some(index), store: Some(store) });
        assert!(!tmp_path(manager.index_path()).exists());
    }

    #[tokio::test]
    async fn missing_artifacts_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            PersistenceManager::new(dir.path().join("a.json"), dir.path().join("b.json"));
        assert_eq!(manager.load().await.unwrap(), PersistedState::default());
    }

    #[tokio::test]
    async fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/deeper");
        let manager = PersistenceManager::new(nested.join("i.json"), nested.join("s.json"));
        let (index, store) = populated();
        manager.save(&index, &store).await.unwrap();
        assert!(nested.join("i.json").exists());
    }

    #[tokio::test]
    async fn corrupt_artifact_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("idx.json");
        std::fs::write(&index_path, b"{ not json").unwrap();
        let manager = PersistenceManager::new(index_path, dir.path().join("store.json"));
        assert!(matches!(manager.load().await, Err(MemoryError::Persistence { .. })));
    }
}
