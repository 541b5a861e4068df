//! Messages exchanged between the background context and the open views

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::NotifyError;
use crate::model::CacheMeta;
use crate::settings::Settings;

/// Capacity of [`BroadcastNotifier`]'s channel
const STATUS_CHANNEL_CAPACITY: usize = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ExtensionMessage {
    /// A view asks the background context to rebuild the cache
    #[serde(rename = "arena-cache-refresh")]
    Refresh(RefreshRequest),
    /// The background context announces a new cache status
    #[serde(rename = "arena-cache-status")]
    Status(CacheMeta),
}

/// Why a refresh was started; only used for logging
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshReason {
    Bootstrap,
    Stale,
    #[default]
    Manual,
    SettingsSave,
    Test,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub reason: RefreshReason,
    /// Build and report without replacing the persisted cache
    #[serde(default)]
    pub test_only: bool,
    /// Build from these settings instead of the persisted ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_override: Option<Settings>,
}

impl RefreshRequest {
    pub fn new(reason: RefreshReason) -> Self {
        Self {
            reason,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub block_count: usize,
    pub fetched_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RefreshSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResponse {
    pub fn success(summary: RefreshSummary) -> Self {
        Self {
            ok: true,
            summary: Some(summary),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            summary: None,
            error: Some(error.into()),
        }
    }
}

/// Fan-out of cache status to every open view
pub trait StatusNotifier: Send + Sync {
    fn notify(&self, meta: &CacheMeta) -> Result<(), NotifyError>;
}

/// [`StatusNotifier`] over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<ExtensionMessage>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionMessage> {
        self.sender.subscribe()
    }
}

impl StatusNotifier for BroadcastNotifier {
    fn notify(&self, meta: &CacheMeta) -> Result<(), NotifyError> {
        self.sender
            .send(ExtensionMessage::Status(meta.clone()))
            .map(|_| ())
            .map_err(|_| NotifyError::NoListeners)
    }
}
