//! Block cache for an Are.na new-tab extension
//!
//! The background context builds a [`BlockCache`] from the configured
//! channels and block ids ([`CacheBuilder`]), keeps it fresh through the
//! single-flight [`RefreshCoordinator`], and every new tab draws from it with
//! [`choose_random_blocks`].

pub mod builder;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod normalize;
pub mod sanitize;
pub mod select;
pub mod settings;
pub mod source;
pub mod status;
pub mod storage;
pub mod time;
pub mod url_safety;

pub use builder::{BuildProgress, BuildRequest, CacheBuilder};
pub use client::ArenaClient;
pub use config::CoreConfig;
pub use coordinator::RefreshCoordinator;
pub use error::{CacheError, Result, StorageError};
pub use messaging::{
    BroadcastNotifier, ExtensionMessage, RefreshReason, RefreshRequest, RefreshResponse,
    StatusNotifier,
};
pub use model::{Block, BlockCache, BlockType, CacheMeta, CacheState};
pub use normalize::Normalizer;
pub use sanitize::{Sanitizer, Strategy};
pub use select::{choose_random_blocks, choose_random_blocks_with};
pub use settings::Settings;
pub use source::{BlockSource, ChannelPage, PaginationLimits};
pub use status::status_label;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use url_safety::safe_url;
