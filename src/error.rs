use thiserror::Error;

/// Errors raised while fetching, building or refreshing the block cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The remote API answered with a non-success status.
    ///
    /// `excerpt` is a short slice of the response body so that large HTML
    /// error pages never end up in logs or status labels.
    #[error("remote request failed ({status}): {excerpt}")]
    RemoteRequest { status: u16, excerpt: String },

    /// The build's cancellation token fired before the fetch completed
    #[error("request canceled")]
    Canceled,

    /// Another refresh is already running
    #[error("cache refresh already in progress")]
    RefreshInProgress,

    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CacheError {
    /// Cancellation is not a failure from the user's point of view
    pub fn is_canceled(&self) -> bool {
        matches!(self, CacheError::Canceled)
    }
}

/// Errors from a key-value persistence backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Errors loading [`CoreConfig`](crate::config::CoreConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors delivering a status broadcast to other views
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Nobody is listening; expected whenever no view is open
    #[error("no listeners for status broadcast")]
    NoListeners,

    #[error("status broadcast failed: {0}")]
    Delivery(String),
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
