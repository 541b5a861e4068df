//! Regex fallback used when the structured sanitizer is unavailable.
//!
//! Strictly weaker than the tokenizer: unterminated script blocks, iframes and
//! the other blocked elements pass through untouched.

use std::sync::LazyLock;

use regex::Regex;

use super::decode_entities;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"));

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:\s+|([/"']))on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("valid regex")
});

static JAVASCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("valid regex"));

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

pub(super) fn sanitize(html: &str) -> String {
    let html = SCRIPT_BLOCK.replace_all(html, "");
    let html = STYLE_BLOCK.replace_all(&html, "");
    let html = EVENT_HANDLER.replace_all(&html, "${1}");
    JAVASCRIPT_SCHEME.replace_all(&html, "").into_owned()
}

pub(super) fn plain_text(html: &str) -> String {
    let cleaned = sanitize(html);
    decode_entities(&ANY_TAG.replace_all(&cleaned, ""))
}
