//! Utility functions and helpers.

pub mod cancel;
pub mod http;
pub mod log;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(|u| u.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Collapse every run of whitespace into a single space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` grapheme clusters, appending an ellipsis
/// when anything was cut.
pub fn truncate_graphemes(s: &str, max_chars: usize) -> String {
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    if graphemes.len() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = graphemes[..keep].concat();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}
