use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StorageError;

/// Capacity of the change channel each store keeps
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A single key changing value; `None` means absent
#[derive(Clone, Debug, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Async JSON key-value persistence shared by every view of the extension
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove several keys; missing keys are ignored
    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;

    /// Observe every change made through this store
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}
