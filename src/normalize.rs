//! Raw API record -> canonical [`Block`]
//!
//! Each derived field is read through an ordered list of JSON pointers; the
//! first pointer that resolves to a non-empty string wins. Keeping the chains
//! as data makes every fallback tier visible and individually testable.

use serde_json::Value;

use crate::model::{Attachment, Block, BlockType, ChannelRef, Embed};
use crate::sanitize::Sanitizer;
use crate::url_safety::safe_url;

pub const TYPE_CHAIN: &[&str] = &["/class", "/base_class", "/kind"];
pub const TITLE_CHAIN: &[&str] = &["/title", "/generated_title", "/content", "/source/title"];
pub const IMAGE_CHAIN: &[&str] = &["/image/display/url", "/image/original/url"];
pub const LINK_CHAIN: &[&str] = &["/external_url", "/source/url"];
pub const DESCRIPTION_HTML_CHAIN: &[&str] = &["/description_html"];
pub const DESCRIPTION_TEXT_CHAIN: &[&str] = &["/description_html", "/description"];
pub const CONTENT_CHAIN: &[&str] = &["/content_html", "/content"];
pub const CHANNEL_TITLE_CHAIN: &[&str] = &["/connected_to_channel/title", "/channel/title"];
pub const CHANNEL_SLUG_CHAIN: &[&str] = &["/connected_to_channel/slug", "/channel/slug"];
pub const AUTHOR_CHAIN: &[&str] = &["/user/full_name", "/user/username"];

// Relative to the `attachment` / `embed` sub-objects
const ATTACHMENT_NAME_CHAIN: &[&str] = &["/file_name", "/filename"];
const EMBED_URL_CHAIN: &[&str] = &["/url", "/src"];

/// The collection currently being enumerated, if any.
///
/// Takes priority over whatever collection the record itself references, so a
/// block is attributed to the channel it was fetched through.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizeContext<'a> {
    pub collection_slug: Option<&'a str>,
    pub collection_title: Option<&'a str>,
}

impl<'a> NormalizeContext<'a> {
    pub fn collection(slug: &'a str, title: Option<&'a str>) -> Self {
        Self {
            collection_slug: Some(slug),
            collection_title: title,
        }
    }
}

/// Resolve `chain` against `raw` and return the first non-empty string
pub fn first_text<'v>(raw: &'v Value, chain: &[&str]) -> Option<&'v str> {
    chain
        .iter()
        .filter_map(|pointer| raw.pointer(pointer))
        .find_map(|value| value.as_str().filter(|s| !s.is_empty()))
}

fn owned(raw: &Value, chain: &[&str]) -> Option<String> {
    first_text(raw, chain).map(str::to_string)
}

fn non_empty<'a>(value: Option<&'a str>) -> Option<&'a str> {
    value.filter(|s| !s.is_empty())
}

/// String form of the record's id; numeric ids are rendered in decimal
pub fn block_id(raw: &Value) -> Option<String> {
    match raw.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Present means "not missing and not null"; an empty object still counts
fn present<'v>(raw: &'v Value, key: &str) -> Option<&'v Value> {
    raw.get(key).filter(|value| !value.is_null())
}

#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    sanitizer: Sanitizer,
}

impl Normalizer {
    pub fn new(sanitizer: Sanitizer) -> Self {
        Self { sanitizer }
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Map a raw record into a [`Block`].
    ///
    /// Returns `None` only when the record has no usable id.
    pub fn normalize(&self, raw: &Value, context: &NormalizeContext<'_>) -> Option<Block> {
        let id = block_id(raw)?;
        let kind = first_text(raw, TYPE_CHAIN)
            .map(BlockType::from)
            .unwrap_or(BlockType::Unknown);

        let title = owned(raw, TITLE_CHAIN).unwrap_or_else(|| format!("Block {}", id));

        let description_html = self
            .sanitizer
            .sanitize_html(first_text(raw, DESCRIPTION_HTML_CHAIN).unwrap_or_default());
        let description_text = self
            .sanitizer
            .to_plain_text(first_text(raw, DESCRIPTION_TEXT_CHAIN).unwrap_or_default());

        let content_html = if kind == BlockType::Text {
            self.sanitizer
                .sanitize_html(first_text(raw, CONTENT_CHAIN).unwrap_or_default())
        } else {
            String::new()
        };

        let channel = ChannelRef {
            title: non_empty(context.collection_title)
                .map(str::to_string)
                .or_else(|| owned(raw, CHANNEL_TITLE_CHAIN)),
            slug: non_empty(context.collection_slug)
                .map(str::to_string)
                .or_else(|| owned(raw, CHANNEL_SLUG_CHAIN)),
        };

        Some(Block {
            slug: owned(raw, &["/slug"]),
            kind,
            title,
            description_html,
            description_text,
            content_html,
            created_at: owned(raw, &["/created_at"]),
            updated_at: owned(raw, &["/updated_at"]),
            image_url: first_text(raw, IMAGE_CHAIN).and_then(safe_url),
            link_url: first_text(raw, LINK_CHAIN).and_then(safe_url),
            attachment: present(raw, "attachment").map(extract_attachment),
            embed: present(raw, "embed").map(|embed| self.extract_embed(embed)),
            channel,
            author: owned(raw, AUTHOR_CHAIN),
            id,
        })
    }

    fn extract_embed(&self, embed: &Value) -> Embed {
        Embed {
            url: first_text(embed, EMBED_URL_CHAIN).and_then(safe_url),
            html: self
                .sanitizer
                .sanitize_html(first_text(embed, &["/html"]).unwrap_or_default()),
            kind: owned(embed, &["/type"]),
        }
    }
}

fn extract_attachment(attachment: &Value) -> Attachment {
    Attachment {
        url: first_text(attachment, &["/url"]).and_then(safe_url),
        file_name: owned(attachment, ATTACHMENT_NAME_CHAIN),
        extension: owned(attachment, &["/extension"]),
        content_type: owned(attachment, &["/content_type"]),
    }
}
