//! User-facing source configuration consumed by the cache builder
//!
//! The settings record is owned by the options page; this crate only reads it
//! and normalizes what it needs. Fields it does not know about (header/footer
//! toggles, theme, tile size, ...) are carried through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::model::BlockType;

pub const DEFAULT_BLOCK_COUNT: usize = 3;
pub const MIN_BLOCK_COUNT: usize = 1;
pub const MAX_BLOCK_COUNT: usize = 6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Channel slugs, fetched in this order
    #[serde(default, deserialize_with = "comma_list")]
    pub channel_slugs: Vec<String>,
    /// Individual block ids, fetched after the channels
    #[serde(default, deserialize_with = "block_id_list")]
    pub block_ids: Vec<String>,
    /// Number of blocks a view shows at once
    #[serde(default = "default_block_count")]
    pub block_count: usize,
    /// Allowed block types; empty means every known type
    #[serde(default = "default_filters")]
    pub filters: Vec<BlockType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_slugs: Vec::new(),
            block_ids: Vec::new(),
            block_count: DEFAULT_BLOCK_COUNT,
            filters: default_filters(),
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Trim list entries, drop empties and clamp the display count
    pub fn normalized(mut self) -> Self {
        self.channel_slugs = clean_entries(self.channel_slugs);
        self.block_ids = clean_entries(self.block_ids);
        self.block_count = self.block_count.clamp(MIN_BLOCK_COUNT, MAX_BLOCK_COUNT);
        self
    }
}

fn default_block_count() -> usize {
    DEFAULT_BLOCK_COUNT
}

fn default_filters() -> Vec<BlockType> {
    BlockType::KNOWN.to_vec()
}

fn clean_entries(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn split_commas(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the channel field of the options form: comma separated, lowercased
pub fn parse_channel_slugs(input: &str) -> Vec<String> {
    split_commas(&input.to_lowercase())
}

/// Parse the block-id field of the options form, keeping only the digits of each entry
pub fn parse_block_ids(input: &str) -> Vec<String> {
    split_commas(input)
        .into_iter()
        .map(|id| id.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Older records stored list fields as the raw comma-separated form input
fn string_items(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn comma_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => split_commas(&s),
        other => string_items(other).unwrap_or_default(),
    })
}

fn block_id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => parse_block_ids(&s),
        other => string_items(other).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_channel_slugs() {
        assert_eq!(
            parse_channel_slugs(" Arena-Influences, ,typography "),
            vec!["arena-influences", "typography"]
        );
        assert!(parse_channel_slugs("").is_empty());
    }

    #[test]
    fn test_parse_block_ids() {
        assert_eq!(
            parse_block_ids("123, #456 ,abc, 7-8"),
            vec!["123", "456", "78"]
        );
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let settings: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.filters.len(), 6);
    }

    #[test]
    fn test_accepts_comma_strings() {
        let settings: Settings = serde_json::from_value(json!({
            "channelSlugs": "one, two",
            "blockIds": "12, x34",
        }))
        .unwrap();
        assert_eq!(settings.channel_slugs, vec!["one", "two"]);
        assert_eq!(settings.block_ids, vec!["12", "34"]);
    }

    #[test]
    fn test_numeric_ids_and_extra_fields_preserved() {
        let settings: Settings = serde_json::from_value(json!({
            "blockIds": [12, "34"],
            "theme": "dark",
            "showHeader": false,
        }))
        .unwrap();
        assert_eq!(settings.block_ids, vec!["12", "34"]);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));

        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["showHeader"], json!(false));
        assert_eq!(value["blockCount"], json!(3));
    }

    #[test]
    fn test_normalized() {
        let settings = Settings {
            channel_slugs: vec![" a ".into(), "".into()],
            block_ids: vec!["  ".into(), "9".into()],
            block_count: 40,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.channel_slugs, vec!["a"]);
        assert_eq!(settings.block_ids, vec!["9"]);
        assert_eq!(settings.block_count, MAX_BLOCK_COUNT);

        let settings = Settings {
            block_count: 0,
            ..Settings::default()
        };
        assert_eq!(settings.normalized().block_count, MIN_BLOCK_COUNT);
    }
}
