//! Assembles a [`BlockCache`] from the configured channels and block ids

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::{Block, BlockCache, BlockType, CacheSources};
use crate::normalize::{NormalizeContext, Normalizer};
use crate::settings::Settings;
use crate::source::{BlockSource, ChannelPage, PaginationLimits, fetch_channel_pages};
use crate::time::now_millis;

/// Reported after every fetched channel page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildProgress {
    pub slug: String,
    pub page: u32,
    /// Items on this page, before filtering
    pub count: usize,
}

pub type ProgressCallback = Arc<dyn Fn(BuildProgress) + Send + Sync>;

/// Inputs of a single build
#[derive(Clone, Default)]
pub struct BuildRequest {
    pub channel_slugs: Vec<String>,
    pub block_ids: Vec<String>,
    /// Allowed types; empty means every known type
    pub filters: Vec<BlockType>,
    pub cancel: CancellationToken,
    pub progress: Option<ProgressCallback>,
}

impl BuildRequest {
    pub fn from_settings(settings: &Settings, cancel: CancellationToken) -> Self {
        Self {
            channel_slugs: settings.channel_slugs.clone(),
            block_ids: settings.block_ids.clone(),
            filters: settings.filters.clone(),
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(
        mut self,
        progress: impl Fn(BuildProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }
}

pub struct CacheBuilder {
    source: Arc<dyn BlockSource>,
    normalizer: Normalizer,
    limits: PaginationLimits,
}

impl CacheBuilder {
    pub fn new(source: Arc<dyn BlockSource>) -> Self {
        Self {
            source,
            normalizer: Normalizer::default(),
            limits: PaginationLimits::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_limits(mut self, limits: PaginationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Fetch every channel and block id in order and merge the results.
    ///
    /// Blocks are deduplicated by id: a later copy replaces the earlier value
    /// but keeps its position. Any failed fetch aborts the build and nothing
    /// partial is returned.
    pub async fn build(&self, request: &BuildRequest) -> Result<BlockCache> {
        let allowed: HashSet<BlockType> = if request.filters.is_empty() {
            BlockType::KNOWN.into_iter().collect()
        } else {
            request.filters.iter().cloned().collect()
        };

        let mut cache = BlockCache::default();

        for slug in &request.channel_slugs {
            let report = |page: u32, channel_page: &ChannelPage| {
                if let Some(progress) = &request.progress {
                    progress(BuildProgress {
                        slug: slug.clone(),
                        page,
                        count: channel_page.contents.len(),
                    });
                }
            };
            let pages = fetch_channel_pages(
                self.source.as_ref(),
                slug,
                self.limits,
                &request.cancel,
                report,
            )
            .await?;

            for page in &pages {
                let context = NormalizeContext::collection(slug, page.title.as_deref());
                for raw in &page.contents {
                    self.merge(&mut cache, raw, &context, &allowed);
                }
            }
        }

        for id in &request.block_ids {
            let raw = self.source.fetch_block(id, &request.cancel).await?;
            self.merge(&mut cache, &raw, &NormalizeContext::default(), &allowed);
        }

        cache.fetched_at = now_millis();
        cache.sources = CacheSources {
            channels: request.channel_slugs.clone(),
            block_ids: request.block_ids.clone(),
        };

        tracing::info!(
            "Built cache with {} blocks from {} channels and {} block ids",
            cache.len(),
            request.channel_slugs.len(),
            request.block_ids.len()
        );
        Ok(cache)
    }

    fn merge(
        &self,
        cache: &mut BlockCache,
        raw: &Value,
        context: &NormalizeContext<'_>,
        allowed: &HashSet<BlockType>,
    ) {
        let Some(block) = self.normalizer.normalize(raw, context) else {
            tracing::warn!("Skipping record without an id");
            return;
        };
        if keep(&block, allowed) {
            cache.upsert(block);
        }
    }
}

fn keep(block: &Block, allowed: &HashSet<BlockType>) -> bool {
    allowed.contains(&block.kind)
}
