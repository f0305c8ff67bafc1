//! URL identity and href resolution.
//!
//! Multistatus responses mix absolute URLs and server-relative paths freely,
//! so collection and object identity is tested with [`url_contains`] rather
//! than strict equality: both sides are trimmed, trailing slashes stripped,
//! and either side containing the other counts as a match. This is the only
//! notion of URL identity the sync engine uses.

use url::Url;

use crate::error::Result;

fn normalize(input: &str) -> &str {
    input.trim().trim_end_matches('/')
}

/// True iff `a` and `b` identify the same resource, tolerating the
/// href-vs-absolute-URL mismatch: after trimming whitespace and trailing
/// slashes, either side may contain the other.
pub fn url_contains(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() && b.is_empty() {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (a, b) = (normalize(a), normalize(b));
    a.contains(b) || b.contains(a)
}

/// Strict equality modulo whitespace and trailing slash.
pub fn url_equals(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Resolve an href against a base URL. Absolute hrefs are preserved as-is.
pub fn resolve_href(base: &str, href: &str) -> Result<String> {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return Ok(href.to_string());
    }
    let base = Url::parse(base.trim())?;
    Ok(base.join(href)?.to_string())
}

/// Path component of an absolute URL; non-URL input is passed through.
pub fn href_path(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.trim().to_string(),
    }
}

