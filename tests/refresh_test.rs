mod common;

use std::sync::Arc;
use std::time::Duration;

use arena_cache::error::StorageError;
use arena_cache::messaging::RefreshSummary;
use arena_cache::storage::{StorageChange, repository};
use arena_cache::time::now_millis;
use arena_cache::{
    BlockCache, BroadcastNotifier, CacheBuilder, CacheError, CacheMeta, CacheState,
    ExtensionMessage, FileStore, KeyValueStore, MemoryStore, RefreshCoordinator, RefreshReason,
    RefreshRequest, Settings,
};
use async_trait::async_trait;
use common::{ScriptedSource, text_block};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct Harness {
    store: Arc<MemoryStore>,
    source: Arc<ScriptedSource>,
    notifier: Arc<BroadcastNotifier>,
    coordinator: Arc<RefreshCoordinator>,
}

async fn harness(source: ScriptedSource, channels: &[&str]) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let settings = Settings {
        channel_slugs: channels.iter().map(|s| s.to_string()).collect(),
        ..Settings::default()
    };
    repository::save_settings(store.as_ref(), settings).await.unwrap();

    let source = Arc::new(source);
    let notifier = Arc::new(BroadcastNotifier::new());
    let coordinator = RefreshCoordinator::new(
        store.clone(),
        CacheBuilder::new(source.clone()),
        notifier.clone(),
    );

    Harness {
        store,
        source,
        notifier,
        coordinator: Arc::new(coordinator),
    }
}

fn two_blocks() -> ScriptedSource {
    ScriptedSource::new().channel(
        "arena",
        "Arena",
        vec![vec![text_block(1, "one"), text_block(2, "two")]],
    )
}

fn manual() -> RefreshRequest {
    RefreshRequest::new(RefreshReason::Manual)
}

async fn wait_until_refreshing(coordinator: &RefreshCoordinator) {
    while !coordinator.is_refreshing() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_refresh_persists_cache_and_meta() {
    let h = harness(two_blocks(), &["arena"]).await;
    let mut status = h.notifier.subscribe();

    let cache = h
        .coordinator
        .refresh(manual(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(cache.block_ids, vec!["1", "2"]);

    let (stored, meta) = repository::load_cache(h.store.as_ref()).await.unwrap();
    assert_eq!(stored, cache);
    assert_eq!(
        meta,
        CacheMeta {
            state: CacheState::Idle,
            last_updated: cache.fetched_at,
            last_error: None,
            block_count: 2,
        }
    );

    let ExtensionMessage::Status(working) = status.recv().await.unwrap() else {
        panic!("expected a status message");
    };
    assert_eq!(working.state, CacheState::Working);
    let ExtensionMessage::Status(idle) = status.recv().await.unwrap() else {
        panic!("expected a status message");
    };
    assert_eq!(idle, meta);
}

#[tokio::test]
async fn test_second_refresh_rejected_while_in_flight() {
    let h = harness(two_blocks().gated(), &["arena"]).await;

    let coordinator = h.coordinator.clone();
    let first = tokio::spawn(async move {
        coordinator
            .refresh(manual(), CancellationToken::new())
            .await
    });
    wait_until_refreshing(&h.coordinator).await;

    let second = h
        .coordinator
        .refresh(manual(), CancellationToken::new())
        .await;
    assert!(matches!(second, Err(CacheError::RefreshInProgress)));

    h.source.open_gate();
    assert_eq!(first.await.unwrap().unwrap().len(), 2);
    assert!(!h.coordinator.is_refreshing());

    let third = h
        .coordinator
        .refresh(manual(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(third.len(), 2);
}

#[tokio::test]
async fn test_test_only_refresh_keeps_persisted_cache() {
    let h = harness(two_blocks(), &["arena"]).await;

    let request = RefreshRequest {
        test_only: true,
        ..RefreshRequest::new(RefreshReason::Test)
    };
    let cache = h
        .coordinator
        .refresh(request, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(cache.len(), 2);

    assert_eq!(h.store.get(repository::CACHE_KEY).await.unwrap(), None);
    let meta = repository::load_meta(h.store.as_ref()).await.unwrap();
    assert_eq!(meta.state, CacheState::Idle);
    assert_eq!(meta.block_count, 2);
    assert_eq!(meta.last_updated, 0);
}

#[tokio::test]
async fn test_settings_override_replaces_persisted_settings() {
    let source = two_blocks().channel("other", "Other", vec![vec![text_block(7, "seven")]]);
    let h = harness(source, &["arena"]).await;

    let request = RefreshRequest {
        settings_override: Some(Settings {
            channel_slugs: vec![" other ".to_string()],
            ..Settings::default()
        }),
        ..RefreshRequest::new(RefreshReason::SettingsSave)
    };
    let cache = h
        .coordinator
        .refresh(request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(cache.block_ids, vec!["7"]);
    assert_eq!(h.source.requested(), vec!["other"]);
}

#[tokio::test]
async fn test_failure_records_error_and_keeps_old_cache() {
    let h = harness(two_blocks().failing("broken"), &["arena"]).await;
    let good = h
        .coordinator
        .refresh(manual(), CancellationToken::new())
        .await
        .unwrap();

    repository::save_settings(
        h.store.as_ref(),
        Settings {
            channel_slugs: vec!["arena".to_string(), "broken".to_string()],
            ..Settings::default()
        },
    )
    .await
    .unwrap();

    let before = now_millis();
    let err = h
        .coordinator
        .refresh(manual(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::RemoteRequest { status: 500, .. }));

    let (cache, meta) = repository::load_cache(h.store.as_ref()).await.unwrap();
    assert_eq!(cache, good);
    assert_eq!(meta.state, CacheState::Error);
    assert!(meta.last_updated >= before);
    assert!(meta.last_error.unwrap().contains("500"));
    assert_eq!(meta.block_count, 2);
    assert!(!h.coordinator.is_refreshing());
}

#[tokio::test]
async fn test_cancel_restores_previous_meta() {
    let h = harness(two_blocks().gated(), &["arena"]).await;
    let previous = CacheMeta {
        state: CacheState::Idle,
        last_updated: 1234,
        last_error: None,
        block_count: 5,
    };
    repository::save_meta(h.store.as_ref(), &previous).await.unwrap();

    let cancel = CancellationToken::new();
    let coordinator = h.coordinator.clone();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { coordinator.refresh(manual(), token).await });
    wait_until_refreshing(&h.coordinator).await;
    while h.source.calls() == 0 {
        tokio::task::yield_now().await;
    }

    cancel.cancel();
    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_canceled());

    let (cache, meta) = repository::load_cache(h.store.as_ref()).await.unwrap();
    assert!(cache.is_empty());
    assert_eq!(meta, previous);
}

/// Memory store that runs out of space when asked to record an idle status
struct IdleMetaRejectingStore {
    inner: MemoryStore,
}

#[async_trait]
impl KeyValueStore for IdleMetaRejectingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if key == repository::META_KEY && value["state"] == "idle" {
            return Err(StorageError::Io(std::io::Error::other("quota exceeded")));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.inner.remove(keys).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.subscribe()
    }
}

#[tokio::test]
async fn test_failed_idle_status_write_records_error() {
    let store = Arc::new(IdleMetaRejectingStore {
        inner: MemoryStore::new(),
    });
    repository::save_settings(
        store.as_ref(),
        Settings {
            channel_slugs: vec!["arena".to_string()],
            ..Settings::default()
        },
    )
    .await
    .unwrap();
    let coordinator = RefreshCoordinator::new(
        store.clone(),
        CacheBuilder::new(Arc::new(two_blocks())),
        Arc::new(BroadcastNotifier::new()),
    );

    let err = coordinator
        .refresh(manual(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Persistence(StorageError::Io(_))));
    assert!(!coordinator.is_refreshing());

    let meta = repository::load_meta(store.as_ref()).await.unwrap();
    assert_eq!(meta.state, CacheState::Error);
    assert!(meta.last_error.unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn test_bootstrap_runs_once() {
    let h = harness(two_blocks(), &["arena"]).await;

    let first = h.coordinator.bootstrap().await.unwrap();
    assert_eq!(first.map(|c| c.len()), Some(2));
    assert!(repository::bootstrap_done(h.store.as_ref()).await.unwrap());

    repository::clear_cache(h.store.as_ref()).await.unwrap();
    assert!(h.coordinator.bootstrap().await.unwrap().is_none());
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test]
async fn test_bootstrap_skipped_when_cache_exists() {
    let h = harness(two_blocks(), &["arena"]).await;
    let mut cache = BlockCache::default();
    cache.block_ids.push("x".to_string());
    repository::save_cache(h.store.as_ref(), &cache).await.unwrap();

    assert!(h.coordinator.bootstrap().await.unwrap().is_none());
    assert!(!repository::bootstrap_done(h.store.as_ref()).await.unwrap());
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn test_refresh_if_stale() {
    let h = harness(two_blocks(), &["arena"]).await;
    let cache = h
        .coordinator
        .refresh(manual(), CancellationToken::new())
        .await
        .unwrap();

    let fresh = cache.fetched_at + 30 * 60 * 1000;
    assert!(h.coordinator.refresh_if_stale(fresh).await.unwrap().is_none());

    let stale = cache.fetched_at + 2 * 60 * 60 * 1000;
    assert!(h.coordinator.refresh_if_stale(stale).await.unwrap().is_some());
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test]
async fn test_custom_stale_window() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = RefreshCoordinator::new(
        store.clone(),
        CacheBuilder::new(Arc::new(ScriptedSource::new())),
        Arc::new(BroadcastNotifier::new()),
    )
    .with_stale_after(Duration::from_secs(10));

    repository::save_meta(
        store.as_ref(),
        &CacheMeta {
            last_updated: 1_000,
            ..CacheMeta::default()
        },
    )
    .await
    .unwrap();

    assert!(coordinator.refresh_if_stale(11_000).await.unwrap().is_none());
    assert!(coordinator.refresh_if_stale(11_001).await.unwrap().is_some());
}

#[tokio::test]
async fn test_handle_message() {
    let h = harness(two_blocks(), &["arena"]).await;

    let response = h
        .coordinator
        .handle_message(ExtensionMessage::Refresh(manual()))
        .await
        .unwrap();
    assert!(response.ok);
    let summary: RefreshSummary = response.summary.unwrap();
    assert_eq!(summary.block_count, 2);
    assert!(summary.fetched_at > 0);

    let ignored = h
        .coordinator
        .handle_message(ExtensionMessage::Status(CacheMeta::default()))
        .await;
    assert!(ignored.is_none());
}

#[tokio::test]
async fn test_handle_message_reports_failure() {
    let h = harness(ScriptedSource::new().failing("down"), &["down"]).await;

    let response = h
        .coordinator
        .handle_message(ExtensionMessage::Refresh(manual()))
        .await
        .unwrap();
    assert!(!response.ok);
    assert!(response.summary.is_none());
    assert!(response.error.unwrap().contains("500"));
}

#[tokio::test]
async fn test_refresh_with_file_store() {
    let dir = std::env::temp_dir().join(format!("refresh_test_{}", uuid::Uuid::new_v4()));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.clone()));
    repository::save_settings(
        store.as_ref(),
        Settings {
            channel_slugs: vec!["arena".to_string()],
            ..Settings::default()
        },
    )
    .await
    .unwrap();

    let coordinator = RefreshCoordinator::new(
        store.clone(),
        CacheBuilder::new(Arc::new(two_blocks())),
        Arc::new(BroadcastNotifier::new()),
    );
    coordinator
        .refresh(manual(), CancellationToken::new())
        .await
        .unwrap();

    let reopened = FileStore::new(dir.clone());
    let (cache, meta) = repository::load_cache(&reopened).await.unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(meta.block_count, 2);

    tokio::fs::remove_dir_all(dir).await.unwrap();
}
