use url::Url;

/// Validate a remote URL before it reaches a `src` or `href`.
///
/// Returns the normalized absolute URL when it parses and its scheme starts
/// with `http`, otherwise `None`. Relative and malformed values are rejected.
pub fn safe_url(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let parsed = Url::parse(candidate).ok()?;
    if parsed.scheme().starts_with("http") {
        Some(parsed.into())
    } else {
        None
    }
}
