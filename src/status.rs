//! Human-readable cache status for the new-tab and options views

use crate::model::{BlockCache, CacheMeta, CacheState};
use crate::sanitize::Sanitizer;
use crate::time::format_relative_time;

/// Longest error text shown in a status label
pub const MAX_ERROR_LABEL_CHARS: usize = 120;

const FALLBACK_ERROR: &str = "Cache error";

fn plural_blocks(count: usize) -> &'static str {
    if count == 1 { "block" } else { "blocks" }
}

/// Error text safe to drop into a label: no markup, single spaces, bounded length
pub fn error_label(last_error: Option<&str>) -> String {
    let text = last_error
        .map(|error| Sanitizer::new().to_plain_text(error))
        .unwrap_or_default();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return FALLBACK_ERROR.to_string();
    }

    if collapsed.chars().count() <= MAX_ERROR_LABEL_CHARS {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(MAX_ERROR_LABEL_CHARS - 1).collect();
    truncated.push('…');
    truncated
}

/// Compact label shown on the new-tab page.
///
/// Zero values in `meta` fall back to what the loaded cache reports.
pub fn status_label(meta: &CacheMeta, cache: Option<&BlockCache>, now: i64) -> String {
    match meta.state {
        CacheState::Working => "Refreshing cache".to_string(),
        CacheState::Error => error_label(meta.last_error.as_deref()),
        CacheState::Idle => {
            let timestamp = if meta.last_updated > 0 {
                meta.last_updated
            } else {
                cache.map(|c| c.fetched_at).unwrap_or(0)
            };
            let count = if meta.block_count > 0 {
                meta.block_count
            } else {
                cache.map(BlockCache::len).unwrap_or(0)
            };

            match (timestamp > 0, count > 0) {
                (true, true) => format!(
                    "{} {} - {}",
                    count,
                    plural_blocks(count),
                    format_relative_time(timestamp, now)
                ),
                (true, false) => format!("Cached {}", format_relative_time(timestamp, now)),
                _ => "Cache idle".to_string(),
            }
        }
    }
}

/// Longer summary used on the options page
pub fn cache_info(meta: &CacheMeta, cache: &BlockCache, now: i64) -> String {
    match meta.state {
        CacheState::Working => "Cache refresh in progress...".to_string(),
        CacheState::Error => error_label(meta.last_error.as_deref()),
        CacheState::Idle if cache.is_empty() => "No cached blocks yet.".to_string(),
        CacheState::Idle => format!(
            "{} cached {} · updated {}",
            cache.len(),
            plural_blocks(cache.len()),
            format_relative_time(meta.last_updated, now)
        ),
    }
}
