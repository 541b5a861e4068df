//! Directory-backed KeyValueStore: one JSON file per key
//!
//! Writes go to a temp file that is renamed over the target, so a reader
//! never sees a half-written value.

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};

use crate::config::CoreConfig;
use crate::error::StorageError;
use crate::storage::traits::{CHANGE_CHANNEL_CAPACITY, KeyValueStore, StorageChange};

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    /// Serializes writers so change events carry the right old value
    write_lock: Mutex<()>,
    changes: broadcast::Sender<StorageChange>,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            root,
            write_lock: Mutex::new(()),
            changes,
        }
    }

    /// Store rooted at the configured data directory, if one can be resolved
    pub fn from_config(config: &CoreConfig) -> Option<Self> {
        config.resolved_data_dir().map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys become file names, so only `[A-Za-z0-9_-]` is accepted
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }

    async fn read(&self, path: &Path) -> Result<Option<Value>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn notify(&self, key: &str, old_value: Option<Value>, new_value: Option<Value>) {
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            old_value,
            new_value,
        });
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key)?;
        self.read(&path).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec(&value)?;

        let _guard = self.write_lock.lock().await;
        // A corrupt previous value must not block overwriting it
        let old = self.read(&path).await.unwrap_or(None);

        fs::create_dir_all(&self.root).await?;
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        self.notify(key, old, Some(value));
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let paths = keys
            .iter()
            .map(|key| self.path_for(key).map(|path| (*key, path)))
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.write_lock.lock().await;
        for (key, path) in paths {
            let old = self.read(&path).await.unwrap_or(None);
            match fs::remove_file(&path).await {
                Ok(()) => self.notify(key, old, None),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
