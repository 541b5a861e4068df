//! Single-flight cache refresh and its status lifecycle
//!
//! Every refresh walks the status record through `working` and then `idle`
//! or `error`. Each transition is persisted and then broadcast to the views.
//! A canceled refresh puts back the status that was there before it started.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::builder::{BuildRequest, CacheBuilder};
use crate::client::ArenaClient;
use crate::config::CoreConfig;
use crate::error::{CacheError, NotifyError, Result};
use crate::messaging::{
    ExtensionMessage, RefreshReason, RefreshRequest, RefreshResponse, RefreshSummary,
    StatusNotifier,
};
use crate::model::{BlockCache, CacheMeta, CacheState};
use crate::source::PaginationLimits;
use crate::storage::KeyValueStore;
use crate::storage::repository;
use crate::time::now_millis;

/// Holds the in-flight flag; clears it when dropped
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct RefreshCoordinator {
    store: Arc<dyn KeyValueStore>,
    builder: CacheBuilder,
    notifier: Arc<dyn StatusNotifier>,
    stale_after: Duration,
    in_flight: AtomicBool,
    shutdown: CancellationToken,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        builder: CacheBuilder,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            store,
            builder,
            notifier,
            stale_after: CoreConfig::default().stale_after(),
            in_flight: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Coordinator fetching from the real API described by `config`
    pub fn from_config(
        config: &CoreConfig,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Result<Self> {
        let client = ArenaClient::from_config(config)?;
        let builder =
            CacheBuilder::new(Arc::new(client)).with_limits(PaginationLimits::from(config));
        Ok(Self::new(store, builder, notifier).with_stale_after(config.stale_after()))
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Cancel the running refresh and every refresh started through
    /// [`handle_message`](Self::handle_message) from now on
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Rebuild the cache.
    ///
    /// Fails immediately with [`CacheError::RefreshInProgress`] while another
    /// refresh runs. On success the new cache is persisted unless the request
    /// is `test_only`, and returned either way.
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        cancel: CancellationToken,
    ) -> Result<BlockCache> {
        let _guard =
            InFlightGuard::acquire(&self.in_flight).ok_or(CacheError::RefreshInProgress)?;
        tracing::info!("Refreshing block cache ({:?})", request.reason);

        let previous = repository::load_meta(self.store.as_ref()).await?;
        self.publish(&CacheMeta {
            state: CacheState::Working,
            ..previous.clone()
        })
        .await?;

        match self.build_and_store(&request, cancel).await {
            Ok(cache) => {
                let last_updated = if request.test_only {
                    previous.last_updated
                } else {
                    cache.fetched_at
                };
                let idle = CacheMeta {
                    state: CacheState::Idle,
                    last_updated,
                    last_error: None,
                    block_count: cache.len(),
                };
                if let Err(e) = self.publish(&idle).await {
                    return Err(self.record_failure(&previous, e).await);
                }
                tracing::info!("Block cache refreshed with {} blocks", cache.len());
                Ok(cache)
            }
            Err(CacheError::Canceled) => {
                tracing::info!("Block cache refresh canceled");
                self.publish_quietly(&previous).await;
                Err(CacheError::Canceled)
            }
            Err(e) => Err(self.record_failure(&previous, e).await),
        }
    }

    /// Leave an `error` status behind so the views never see a stuck `working`
    async fn record_failure(&self, previous: &CacheMeta, error: CacheError) -> CacheError {
        tracing::warn!("Block cache refresh failed: {}", error);
        self.publish_quietly(&CacheMeta {
            state: CacheState::Error,
            last_updated: now_millis(),
            last_error: Some(error.to_string()),
            block_count: previous.block_count,
        })
        .await;
        error
    }

    async fn build_and_store(
        &self,
        request: &RefreshRequest,
        cancel: CancellationToken,
    ) -> Result<BlockCache> {
        let settings = match &request.settings_override {
            Some(settings) => settings.clone().normalized(),
            None => repository::load_settings(self.store.as_ref()).await?,
        };
        let cache = self
            .builder
            .build(&BuildRequest::from_settings(&settings, cancel))
            .await?;

        if !request.test_only {
            repository::save_cache(self.store.as_ref(), &cache).await?;
        }
        Ok(cache)
    }

    /// Refresh once on first run, when nothing has been cached yet.
    ///
    /// The bootstrap marker is written before the refresh starts, so a failed
    /// first build is not retried on the next start.
    pub async fn bootstrap(&self) -> Result<Option<BlockCache>> {
        let (cache, _) = repository::load_cache(self.store.as_ref()).await?;
        if !cache.is_empty() || repository::bootstrap_done(self.store.as_ref()).await? {
            return Ok(None);
        }

        repository::mark_bootstrap_done(self.store.as_ref()).await?;
        self.refresh(
            RefreshRequest::new(RefreshReason::Bootstrap),
            self.shutdown.child_token(),
        )
        .await
        .map(Some)
    }

    /// Refresh when the last successful update is older than the staleness window
    pub async fn refresh_if_stale(&self, now: i64) -> Result<Option<BlockCache>> {
        if self.is_refreshing() {
            return Ok(None);
        }

        let meta = repository::load_meta(self.store.as_ref()).await?;
        let stale_after = i64::try_from(self.stale_after.as_millis()).unwrap_or(i64::MAX);
        if now.saturating_sub(meta.last_updated) <= stale_after {
            return Ok(None);
        }

        self.refresh(
            RefreshRequest::new(RefreshReason::Stale),
            self.shutdown.child_token(),
        )
        .await
        .map(Some)
    }

    /// Answer a message from a view; only refresh requests get a response
    pub async fn handle_message(&self, message: ExtensionMessage) -> Option<RefreshResponse> {
        let ExtensionMessage::Refresh(request) = message else {
            return None;
        };

        let response = match self.refresh(request, self.shutdown.child_token()).await {
            Ok(cache) => RefreshResponse::success(RefreshSummary {
                block_count: cache.len(),
                fetched_at: cache.fetched_at,
            }),
            Err(e) => {
                tracing::error!("Refresh request failed: {}", e);
                RefreshResponse::failure(e.to_string())
            }
        };
        Some(response)
    }

    /// Persist a status record, then tell the views about it
    async fn publish(&self, meta: &CacheMeta) -> Result<()> {
        repository::save_meta(self.store.as_ref(), meta).await?;
        match self.notifier.notify(meta) {
            Ok(()) => {}
            Err(NotifyError::NoListeners) => {
                tracing::debug!("No views listening for cache status");
            }
            Err(e) => tracing::warn!("Failed to broadcast cache status: {}", e),
        }
        Ok(())
    }

    /// Like [`publish`](Self::publish) on a path that already has an error to report
    async fn publish_quietly(&self, meta: &CacheMeta) {
        if let Err(e) = self.publish(meta).await {
            tracing::warn!("Failed to record cache status: {}", e);
        }
    }
}
