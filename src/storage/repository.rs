//! Typed access to the extension's storage keys

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StorageError;
use crate::model::{BlockCache, CACHE_VERSION, CacheMeta};
use crate::settings::Settings;
use crate::storage::KeyValueStore;

pub const SETTINGS_KEY: &str = "settings";
pub const CACHE_KEY: &str = "blockCache";
pub const META_KEY: &str = "blockCacheMeta";
pub const BOOTSTRAP_KEY: &str = "bootstrap";

/// Decode a stored value, treating undecodable records as missing
fn decode_or_none<T: DeserializeOwned>(key: &str, value: Option<Value>) -> Option<T> {
    let value = value?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!("Ignoring unreadable '{}' record: {}", key, e);
            None
        }
    }
}

async fn put<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// Stored settings merged over the defaults
pub async fn load_settings(store: &dyn KeyValueStore) -> Result<Settings, StorageError> {
    let stored = store.get(SETTINGS_KEY).await?;
    Ok(decode_or_none(SETTINGS_KEY, stored).unwrap_or_default())
}

/// Persist settings after trimming lists and clamping the block count
pub async fn save_settings(
    store: &dyn KeyValueStore,
    settings: Settings,
) -> Result<Settings, StorageError> {
    let settings = settings.normalized();
    put(store, SETTINGS_KEY, &settings).await?;
    Ok(settings)
}

/// Load the cache and its meta record.
///
/// A cache written with a different schema version, or one that fails to
/// decode, comes back as an empty default cache. A missing meta record is
/// the default idle meta.
pub async fn load_cache(
    store: &dyn KeyValueStore,
) -> Result<(BlockCache, CacheMeta), StorageError> {
    let cache = store.get(CACHE_KEY).await?;
    let meta = store.get(META_KEY).await?;

    let cache = match decode_or_none::<BlockCache>(CACHE_KEY, cache) {
        Some(cache) if cache.version == CACHE_VERSION => cache,
        Some(cache) => {
            tracing::info!(
                "Discarding cache with version {} (expected {})",
                cache.version,
                CACHE_VERSION
            );
            BlockCache::default()
        }
        None => BlockCache::default(),
    };
    let meta = decode_or_none(META_KEY, meta).unwrap_or_default();

    Ok((cache, meta))
}

pub async fn load_meta(store: &dyn KeyValueStore) -> Result<CacheMeta, StorageError> {
    let meta = store.get(META_KEY).await?;
    Ok(decode_or_none(META_KEY, meta).unwrap_or_default())
}

/// Persist a cache, stamping the current schema version
pub async fn save_cache(store: &dyn KeyValueStore, cache: &BlockCache) -> Result<(), StorageError> {
    if cache.version == CACHE_VERSION {
        return put(store, CACHE_KEY, cache).await;
    }
    let stamped = BlockCache {
        version: CACHE_VERSION,
        ..cache.clone()
    };
    put(store, CACHE_KEY, &stamped).await
}

pub async fn save_meta(store: &dyn KeyValueStore, meta: &CacheMeta) -> Result<(), StorageError> {
    put(store, META_KEY, meta).await
}

/// Drop both the cache and its meta record
pub async fn clear_cache(store: &dyn KeyValueStore) -> Result<(), StorageError> {
    store.remove(&[CACHE_KEY, META_KEY]).await
}

pub async fn bootstrap_done(store: &dyn KeyValueStore) -> Result<bool, StorageError> {
    Ok(store
        .get(BOOTSTRAP_KEY)
        .await?
        .and_then(|value| value.as_bool())
        .unwrap_or(false))
}

pub async fn mark_bootstrap_done(store: &dyn KeyValueStore) -> Result<(), StorageError> {
    store.set(BOOTSTRAP_KEY, Value::Bool(true)).await
}
