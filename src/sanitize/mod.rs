//! HTML sanitization for remote description, content and embed fragments
//!
//! Two strategies satisfy the same contract:
//! - `Structured` tokenizes the fragment into tags, attributes and text and
//!   rebuilds it from the allowed pieces (requires the `structured-html` feature)
//! - `Pattern` is a regex-based degraded mode: it strips script/style blocks,
//!   event-handler attributes and `javascript:` occurrences, nothing more
//!
//! The strategy is picked when the [`Sanitizer`] is constructed.

mod pattern;
#[cfg(feature = "structured-html")]
mod structured;

use std::sync::Once;

use url::Url;

/// Elements removed together with their content
pub(crate) const BLOCKED_TAGS: &[&str] = &[
    "script", "style", "template", "object", "embed", "textarea", "title", "xmp", "noscript",
    "noembed", "noframes", "plaintext",
];

/// Sandbox forced onto every iframe that survives sanitization
pub(crate) const IFRAME_SANDBOX: &str = "allow-same-origin allow-scripts allow-popups";

static DEGRADED_WARNING: Once = Once::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    Structured,
    Pattern,
}

/// Sanitizer with a strategy fixed at construction time
#[derive(Clone, Debug)]
pub struct Sanitizer {
    strategy: Strategy,
}

impl Sanitizer {
    /// Use the strongest strategy compiled into this build
    pub fn new() -> Self {
        #[cfg(feature = "structured-html")]
        {
            Self::with_strategy(Strategy::Structured)
        }
        #[cfg(not(feature = "structured-html"))]
        {
            Self::with_strategy(Strategy::Pattern)
        }
    }

    /// Force the regex fallback
    pub fn pattern() -> Self {
        Self::with_strategy(Strategy::Pattern)
    }

    /// Pick a strategy explicitly.
    ///
    /// Asking for `Structured` without the `structured-html` feature falls
    /// back to `Pattern`.
    pub fn with_strategy(strategy: Strategy) -> Self {
        #[cfg(not(feature = "structured-html"))]
        let strategy = Strategy::Pattern;

        if strategy == Strategy::Pattern {
            DEGRADED_WARNING.call_once(|| {
                tracing::warn!("HTML sanitizer running in degraded pattern mode");
            });
        }
        Self { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Remove unsafe elements and attributes from an HTML fragment
    pub fn sanitize_html(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }
        match self.strategy {
            #[cfg(feature = "structured-html")]
            Strategy::Structured => structured::sanitize(html),
            #[cfg(not(feature = "structured-html"))]
            Strategy::Structured => pattern::sanitize(html),
            Strategy::Pattern => pattern::sanitize(html),
        }
    }

    /// Text content of an HTML fragment with every tag removed.
    ///
    /// Whitespace and line structure are not preserved.
    pub fn to_plain_text(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }
        match self.strategy {
            #[cfg(feature = "structured-html")]
            Strategy::Structured => structured::plain_text(html),
            #[cfg(not(feature = "structured-html"))]
            Strategy::Structured => pattern::plain_text(html),
            Strategy::Pattern => pattern::plain_text(html),
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode character references (`&amp;`, `&#106;`, `&#x6A;`, ...).
///
/// Unknown or malformed references are left untouched.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match decode_reference(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Longest reference name looked at, not counting `&` and `;`
const MAX_REFERENCE_LEN: usize = 12;

/// Decode one reference at the start of `input` (which begins with `&`).
/// Returns the character and the number of bytes consumed.
fn decode_reference(input: &str) -> Option<(char, usize)> {
    let semicolon = input.as_bytes()[1..]
        .iter()
        .take(MAX_REFERENCE_LEN)
        .position(|&b| b == b';')?
        + 1;
    let name = &input[1..semicolon];
    let ch = if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        match name {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "nbsp" => '\u{a0}',
            "colon" => ':',
            "Tab" => '\t',
            "NewLine" => '\n',
            _ => return None,
        }
    };
    Some((ch, semicolon + 1))
}

/// True when an attribute value would run script once the browser resolves it
pub(crate) fn is_javascript_url(value: &str) -> bool {
    let decoded = decode_entities(value);
    let compact: String = decoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    compact.to_ascii_lowercase().starts_with("javascript:")
}

/// Iframes are only kept when they point at an absolute https URL
pub(crate) fn is_https_url(value: &str) -> bool {
    Url::parse(decode_entities(value).trim())
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}
