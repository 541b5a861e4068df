//! Remote block sources and the channel pagination policy

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{CoreConfig, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::error::Result;

/// One page of a channel's contents
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ChannelPage {
    #[serde(default)]
    pub title: Option<String>,
    /// Raw block records, normalized later by the builder
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contents: Vec<Value>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where blocks come from.
///
/// Implemented by [`ArenaClient`](crate::client::ArenaClient) for the real API;
/// tests substitute scripted sources.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch page `page` (1-based) of a channel with `per` items per page
    async fn fetch_channel_page(
        &self,
        slug: &str,
        page: u32,
        per: usize,
        cancel: &CancellationToken,
    ) -> Result<ChannelPage>;

    /// Fetch a single raw block record
    async fn fetch_block(&self, id: &str, cancel: &CancellationToken) -> Result<Value>;
}

/// Bounds on how much of a channel is ingested
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PaginationLimits {
    pub page_size: usize,
    pub max_pages: u32,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl From<&CoreConfig> for PaginationLimits {
    fn from(config: &CoreConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }
}

/// Fetch a channel page by page, in ascending order.
///
/// Stops after the first short page or after `max_pages` pages, whichever
/// comes first; channels larger than `page_size * max_pages` are truncated.
/// The first failing page aborts the whole fetch. `on_page` sees each page
/// as soon as it arrives, before the next one is requested.
pub async fn fetch_channel_pages(
    source: &dyn BlockSource,
    slug: &str,
    limits: PaginationLimits,
    cancel: &CancellationToken,
    mut on_page: impl FnMut(u32, &ChannelPage),
) -> Result<Vec<ChannelPage>> {
    let mut pages = Vec::new();

    for page in 1..=limits.max_pages {
        let channel_page = source
            .fetch_channel_page(slug, page, limits.page_size, cancel)
            .await?;
        let full = channel_page.contents.len() >= limits.page_size;
        tracing::debug!(
            "Fetched channel '{}' page {} ({} items)",
            slug,
            page,
            channel_page.contents.len()
        );
        on_page(page, &channel_page);
        pages.push(channel_page);

        if !full {
            return Ok(pages);
        }
    }

    tracing::info!(
        "Channel '{}' truncated at {} pages of {}",
        slug,
        limits.max_pages,
        limits.page_size
    );
    Ok(pages)
}
