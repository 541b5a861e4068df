//! Canonical block, cache and cache-status records
//!
//! Field names serialize in camelCase because the same records are read by the
//! extension's views straight out of storage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Schema version stamped on every persisted [`BlockCache`]
pub const CACHE_VERSION: u32 = 1;

/// Block classes reported by the remote API.
///
/// Classes outside the known set are carried as `Other` so they can still be
/// displayed in status output, but they never pass the default type filter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    Image,
    Text,
    Link,
    Attachment,
    Embed,
    Channel,
    Unknown,
    Other(String),
}

impl BlockType {
    /// The block classes a cache can be filtered to
    pub const KNOWN: [BlockType; 6] = [
        BlockType::Image,
        BlockType::Text,
        BlockType::Link,
        BlockType::Attachment,
        BlockType::Embed,
        BlockType::Channel,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            BlockType::Image => "Image",
            BlockType::Text => "Text",
            BlockType::Link => "Link",
            BlockType::Attachment => "Attachment",
            BlockType::Embed => "Embed",
            BlockType::Channel => "Channel",
            BlockType::Unknown => "Unknown",
            BlockType::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(self)
    }
}

impl From<&str> for BlockType {
    fn from(value: &str) -> Self {
        match value {
            "Image" => BlockType::Image,
            "Text" => BlockType::Text,
            "Link" => BlockType::Link,
            "Attachment" => BlockType::Attachment,
            "Embed" => BlockType::Embed,
            "Channel" => BlockType::Channel,
            "Unknown" | "" => BlockType::Unknown,
            other => BlockType::Other(other.to_string()),
        }
    }
}

impl From<String> for BlockType {
    fn from(value: String) -> Self {
        BlockType::from(value.as_str())
    }
}

impl From<BlockType> for String {
    fn from(value: BlockType) -> Self {
        match value {
            BlockType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub extension: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub url: Option<String>,
    /// Sanitized embed markup
    pub html: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// The collection a block is attributed to
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub title: Option<String>,
    pub slug: Option<String>,
}

/// A normalized content item.
///
/// Every URL field holds either `None` or an absolute http(s) URL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub title: String,
    pub description_html: String,
    pub description_text: String,
    /// Only populated for `Text` blocks
    pub content_html: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub attachment: Option<Attachment>,
    pub embed: Option<Embed>,
    pub channel: ChannelRef,
    pub author: Option<String>,
}

/// The configuration a cache was built from, kept for display
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSources {
    pub channels: Vec<String>,
    pub block_ids: Vec<String>,
}

/// Deduplicated blocks keyed by id, plus the order they were merged in
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCache {
    pub version: u32,
    pub fetched_at: i64,
    pub block_ids: Vec<String>,
    pub blocks_by_id: HashMap<String, Block>,
    pub sources: CacheSources,
}

impl Default for BlockCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            fetched_at: 0,
            block_ids: Vec::new(),
            blocks_by_id: HashMap::new(),
            sources: CacheSources::default(),
        }
    }
}

impl BlockCache {
    pub fn len(&self) -> usize {
        self.block_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_ids.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks_by_id.get(id)
    }

    /// Insert or overwrite a block.
    ///
    /// The latest value wins; an id that was already present keeps its
    /// original position in `block_ids`.
    pub fn upsert(&mut self, block: Block) {
        if !self.blocks_by_id.contains_key(&block.id) {
            self.block_ids.push(block.id.clone());
        }
        self.blocks_by_id.insert(block.id.clone(), block);
    }

    /// Blocks in merge order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.block_ids.iter().filter_map(|id| self.blocks_by_id.get(id))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    #[default]
    Idle,
    Working,
    Error,
}

/// Refresh status shared with every open view
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheMeta {
    pub state: CacheState,
    pub last_updated: i64,
    pub last_error: Option<String>,
    pub block_count: usize,
}
