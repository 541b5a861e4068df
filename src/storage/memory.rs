//! In-memory KeyValueStore implementation

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};

use crate::error::StorageError;
use crate::storage::traits::{CHANGE_CHANNEL_CAPACITY, KeyValueStore, StorageChange};

/// In-memory store for tests and ephemeral sessions
#[derive(Debug)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, key: &str, old_value: Option<Value>, new_value: Option<Value>) {
        // No subscribers is not an error
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            old_value,
            new_value,
        });
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let old = self
            .values
            .write()
            .await
            .insert(key.to_string(), value.clone());
        self.notify(key, old, Some(value));
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut values = self.values.write().await;
        for key in keys {
            if let Some(old) = values.remove(*key) {
                self.notify(key, Some(old), None);
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_remove_ignores_missing() {
        let store = MemoryStore::new();
        store.set("a", json!(1)).await.unwrap();
        store.remove(&["a", "b"]).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set("k", json!(1)).await.unwrap();
        store.set("k", json!(2)).await.unwrap();
        store.remove(&["k"]).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value, Some(json!(1)));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.old_value, Some(json!(1)));

        let third = rx.recv().await.unwrap();
        assert_eq!(third.key, "k");
        assert_eq!(third.new_value, None);
    }
}
