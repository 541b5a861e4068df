//! Scripted block source shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use arena_cache::error::Result;
use arena_cache::{BlockSource, CacheError, ChannelPage};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Serves canned channel pages and blocks.
///
/// With a gate set, every fetch waits for a permit (or for cancellation)
/// before answering.
#[derive(Default)]
pub struct ScriptedSource {
    channels: HashMap<String, Vec<ChannelPage>>,
    blocks: HashMap<String, Value>,
    failing: HashSet<String>,
    gate: Option<Semaphore>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(mut self, slug: &str, title: &str, pages: Vec<Vec<Value>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|contents| ChannelPage {
                title: Some(title.to_string()),
                contents,
            })
            .collect();
        self.channels.insert(slug.to_string(), pages);
        self
    }

    pub fn block(mut self, id: &str, raw: Value) -> Self {
        self.blocks.insert(id.to_string(), raw);
        self
    }

    /// Requests for this channel slug or block id answer with a 500
    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1_000);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    async fn enter(&self, key: String, cancel: &CancellationToken) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(key.clone());

        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = cancel.cancelled() => return Err(CacheError::Canceled),
                permit = gate.acquire() => drop(permit),
            }
        }
        if cancel.is_cancelled() {
            return Err(CacheError::Canceled);
        }
        if self.failing.contains(&key) {
            return Err(CacheError::RemoteRequest {
                status: 500,
                excerpt: "Internal Server Error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlockSource for ScriptedSource {
    async fn fetch_channel_page(
        &self,
        slug: &str,
        page: u32,
        _per: usize,
        cancel: &CancellationToken,
    ) -> Result<ChannelPage> {
        self.enter(slug.to_string(), cancel).await?;
        Ok(self
            .channels
            .get(slug)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_block(&self, id: &str, cancel: &CancellationToken) -> Result<Value> {
        self.enter(id.to_string(), cancel).await?;
        self.blocks.get(id).cloned().ok_or(CacheError::RemoteRequest {
            status: 404,
            excerpt: "Not Found".to_string(),
        })
    }
}

pub fn text_block(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "class": "Text",
        "title": title,
        "content_html": format!("<p>{}</p>", title),
    })
}

pub fn image_block(id: u64) -> Value {
    json!({
        "id": id,
        "class": "Image",
        "title": format!("Image {}", id),
        "image": {"display": {"url": format!("https://images.are.na/{}.jpg", id)}},
    })
}
