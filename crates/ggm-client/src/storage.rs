//! Persisted client state.
//!
//! A small string key/value store that survives restarts. The file-backed
//! store keeps every key in one JSON object, rewritten atomically on save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::error::{ClientError, ClientResult};

const STATE_FILE: &str = "storage.json";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn load(&self, key: &str) -> ClientResult<Option<String>>;
    async fn save(&self, key: &str, value: &str) -> ClientResult<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> ClientResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by `{dir}/storage.json`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STATE_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable file reads as empty.
    async fn read_all(&self) -> BTreeMap<String, String> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(error = %e, path = %self.path.display(), "ignoring corrupt state file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn load(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.read_all().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> ClientResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut values = self.read_all().await;
        values.insert(key.to_string(), value.to_string());

        let bytes = serde_json::to_vec_pretty(&values).map_err(|e| ClientError::Storage {
            message: format!("failed to serialize state: {}", e),
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::Storage {
                    message: format!("failed to create state dir: {}", e),
                })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| ClientError::Storage {
                message: format!("failed to write temp file: {}", e),
            })?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ClientError::Storage {
                message: format!("failed to rename temp file: {}", e),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path().join("nested"));

        assert_eq!(store.load("researcher_id").await.unwrap(), None);
        store.save("researcher_id", "A. Researcher").await.unwrap();
        store.save("theme", "dark").await.unwrap();

        let reopened = FileStore::in_dir(dir.path().join("nested"));
        assert_eq!(
            reopened.load("researcher_id").await.unwrap().as_deref(),
            Some("A. Researcher")
        );
        assert_eq!(reopened.load("theme").await.unwrap().as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_empty_and_is_replaced() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        fs::write(store.path(), b"{ not json").await.unwrap();

        assert_eq!(store.load("researcher_id").await.unwrap(), None);
        store.save("researcher_id", "B").await.unwrap();
        assert_eq!(store.load("researcher_id").await.unwrap().as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_memory_store_overwrite() {
        let store = MemoryStore::new();
        store.save("k", "1").await.unwrap();
        store.save("k", "2").await.unwrap();
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some("2"));
    }
}
