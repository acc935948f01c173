//! Persistent schedule storage
//!
//! The last-known-good schedule is kept as an opaque blob under a single
//! well-known key. [`BlobStore`] is the storage boundary; [`FileStore`] keeps
//! one file per key on disk and [`MemoryStore`] is used in tests.
//! [`ScheduleStore`] layers schedule (de)serialization on top.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotcast::storage::{FileStore, ScheduleStore};
//!
//! let store = ScheduleStore::new(Arc::new(FileStore::new("data")));
//! if let Some(schedule) = store.load().await? {
//!     println!("{} slots persisted", schedule.len());
//! }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::Schedule;

/// Key under which the current schedule is persisted
pub const SCHEDULE_KEY: &str = "scheduled_json";

/// Errors from persistent storage
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying I/O failure
    #[error("I/O error during '{operation}': {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// Blob could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key/value storage of opaque blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob under `key`, `None` when absent
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write (or overwrite) the blob under `key`
    async fn save(&self, key: &str, blob: &[u8]) -> StoreResult<()>;

    /// Delete the blob under `key`; absent keys are not an error
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

// ============================================================================
// File Store
// ============================================================================

/// One JSON file per key inside a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl BlobStore for FileStore {
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io("load", e)),
        }
    }

    async fn save(&self, key: &str, blob: &[u8]) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io("create_dir", e))?;

        // Write-then-rename; readers never observe a truncated blob
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob)
            .await
            .map_err(|e| StoreError::io("save", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io("save", e))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("remove", e)),
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-memory blob store
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a blob exists under `key`
    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, blob: &[u8]) -> StoreResult<()> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// Schedule Store
// ============================================================================

/// Last-known-good schedule persisted under [`SCHEDULE_KEY`]
#[derive(Clone)]
pub struct ScheduleStore {
    blobs: Arc<dyn BlobStore>,
}

impl ScheduleStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Load the persisted schedule
    ///
    /// A blob that no longer parses as a valid schedule is removed and
    /// reported as absent.
    pub async fn load(&self) -> StoreResult<Option<Schedule>> {
        let Some(blob) = self.blobs.load(SCHEDULE_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<Schedule>(&blob) {
            Ok(schedule) => Ok(Some(schedule)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted schedule");
                self.clear().await?;
                Ok(None)
            }
        }
    }

    pub async fn save(&self, schedule: &Schedule) -> StoreResult<()> {
        let blob = serde_json::to_vec(schedule)?;
        self.blobs.save(SCHEDULE_KEY, &blob).await?;
        tracing::debug!(slots = schedule.len(), "Persisted schedule");
        Ok(())
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.blobs.remove(SCHEDULE_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attribution, ImageRef, ScreenGeometry, Slot};

    fn create_test_schedule() -> Schedule {
        let slots = (0..3)
            .map(|i| Slot {
                id: format!("slot-{i}"),
                start_time: i * 1000,
                top_image: ImageRef::new("https://cdn.test/top.png", 100, 80),
                footer_image: ImageRef::new("https://cdn.test/footer.png", 100, 20),
                attribution: Attribution::default(),
            })
            .collect();
        Schedule::new("screen-1", ScreenGeometry::default(), slots).unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load("k").await.unwrap().is_none());

        store.save("k", b"blob").await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(b"blob".to_vec()));

        store.remove("k").await.unwrap();
        assert!(!store.contains("k").await);
        // Removing twice is fine
        store.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path().join("nested"));

        assert!(store.load(SCHEDULE_KEY).await.unwrap().is_none());
        store.save(SCHEDULE_KEY, b"{}").await.unwrap();
        assert!(temp_dir.path().join("nested/scheduled_json.json").exists());
        assert_eq!(store.load(SCHEDULE_KEY).await.unwrap(), Some(b"{}".to_vec()));

        store.remove(SCHEDULE_KEY).await.unwrap();
        store.remove(SCHEDULE_KEY).await.unwrap();
        assert!(store.load(SCHEDULE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schedule_store_persists_schedule() {
        let store = ScheduleStore::new(Arc::new(MemoryStore::new()));
        let schedule = create_test_schedule();

        store.save(&schedule).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(schedule));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schedule_store_discards_corrupt_blob() {
        let blobs = Arc::new(MemoryStore::new());
        blobs.save(SCHEDULE_KEY, b"not json").await.unwrap();

        let store = ScheduleStore::new(blobs.clone());
        assert!(store.load().await.unwrap().is_none());
        assert!(!blobs.contains(SCHEDULE_KEY).await);
    }

    #[tokio::test]
    async fn test_schedule_store_discards_out_of_range_times() {
        let blobs = Arc::new(MemoryStore::new());
        let json = serde_json::to_string(&create_test_schedule())
            .unwrap()
            .replace("\"start_time\":2000", "\"start_time\":9223372036854775000");
        blobs.save(SCHEDULE_KEY, json.as_bytes()).await.unwrap();

        let store = ScheduleStore::new(blobs.clone());
        assert!(store.load().await.unwrap().is_none());
        assert!(!blobs.contains(SCHEDULE_KEY).await);
    }
}
