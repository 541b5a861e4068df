//! HTTP client for the Are.na v2 API

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event, instrument};

use crate::config::CoreConfig;
use crate::error::{CacheError, Result};
use crate::source::{BlockSource, ChannelPage};

/// Longest slice of an error body carried in [`CacheError::RemoteRequest`]
pub const MAX_ERROR_EXCERPT_CHARS: usize = 20;

#[derive(Clone, Debug)]
pub struct ArenaClient {
    client: reqwest::Client,
    api_root: String,
}

impl ArenaClient {
    pub fn new(api_root: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder().default_headers(headers).build()?;

        let api_root: String = api_root.into();
        Ok(ArenaClient {
            client,
            api_root: api_root.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        Self::new(config.api_root.clone())
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// GET `{api_root}{path}` and decode the body as JSON.
    ///
    /// Fails with [`CacheError::Canceled`] if `cancel` fires first, and with
    /// [`CacheError::RemoteRequest`] on a non-success status.
    #[instrument(level = "debug", skip(self, cancel))]
    pub async fn fetch_json(&self, path: &str, cancel: &CancellationToken) -> Result<Value> {
        if cancel.is_cancelled() {
            return Err(CacheError::Canceled);
        }
        let url = format!("{}{}", self.api_root, path);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CacheError::Canceled),
            result = self.get_json(&url) => result,
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CacheError::RemoteRequest {
                status: status.as_u16(),
                excerpt: error_excerpt(&body, status),
            });
        }

        let text = response.text().await?;
        event!(Level::TRACE, bytes = text.len());
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl BlockSource for ArenaClient {
    async fn fetch_channel_page(
        &self,
        slug: &str,
        page: u32,
        per: usize,
        cancel: &CancellationToken,
    ) -> Result<ChannelPage> {
        let value = self
            .fetch_json(&channel_contents_path(slug, page, per), cancel)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fetch_block(&self, id: &str, cancel: &CancellationToken) -> Result<Value> {
        self.fetch_json(&block_path(id), cancel).await
    }
}

pub fn channel_contents_path(slug: &str, page: u32, per: usize) -> String {
    format!(
        "/channels/{}/contents?page={}&per={}",
        urlencoding::encode(slug),
        page,
        per
    )
}

pub fn block_path(id: &str) -> String {
    format!("/blocks/{}", urlencoding::encode(id))
}

/// Whitespace-collapsed start of an error body, or the status reason if the body is empty
fn error_excerpt(body: &str, status: StatusCode) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    collapsed.chars().take(MAX_ERROR_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(
            channel_contents_path("arena-influences", 2, 100),
            "/channels/arena-influences/contents?page=2&per=100"
        );
        assert_eq!(block_path("12345"), "/blocks/12345");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(
            channel_contents_path("a b/c?d", 1, 100),
            "/channels/a%20b%2Fc%3Fd/contents?page=1&per=100"
        );
        assert_eq!(block_path("é"), "/blocks/%C3%A9");
        assert_eq!(block_path("1#2&per=1"), "/blocks/1%232%26per%3D1");
        assert_eq!(block_path("my-block_1.~"), "/blocks/my-block_1.~");
    }

    #[test]
    fn test_error_excerpt_is_bounded() {
        let body = "<!DOCTYPE html>\n<html>\n  <body>a very long error page</body></html>";
        let excerpt = error_excerpt(body, StatusCode::BAD_GATEWAY);
        assert_eq!(excerpt, "<!DOCTYPE html> <htm");
        assert!(excerpt.chars().count() <= MAX_ERROR_EXCERPT_CHARS);
    }

    #[test]
    fn test_error_excerpt_falls_back_to_reason() {
        assert_eq!(error_excerpt("  \n", StatusCode::NOT_FOUND), "Not Found");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ArenaClient::new("https://api.are.na/v2/").unwrap();
        assert_eq!(client.api_root(), "https://api.are.na/v2");
    }

    #[tokio::test]
    async fn test_canceled_before_request() {
        let client = ArenaClient::new("http://127.0.0.1:9").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.fetch_json("/blocks/1", &cancel).await.unwrap_err();
        assert!(err.is_canceled());
    }
}
