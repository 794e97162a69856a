//! Continuation cursors from `Link` response headers.

use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use std::sync::OnceLock;

fn link_regex() -> &'static Regex {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    // One `<url>; param; param` entry; params run until the next `<`.
    LINK_RE.get_or_init(|| Regex::new(r"<([^>]*)>([^<]*)").expect("Invalid regex"))
}

fn rel_regex() -> &'static Regex {
    static REL_RE: OnceLock<Regex> = OnceLock::new();
    REL_RE.get_or_init(|| {
        Regex::new(r#"(?i)\brel\s*=\s*(?:"([^"]*)"|([^\s;,]+))"#).expect("Invalid regex")
    })
}

/// Extract the `rel="next"` target from every `Link` header on a response.
///
/// Returns `None` when the listing is exhausted.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(find_next)
}

fn find_next(header: &str) -> Option<String> {
    link_regex().captures_iter(header).find_map(|caps| {
        let target = caps.get(1)?.as_str().trim();
        let params = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let is_next = rel_regex().captures_iter(params).any(|rel| {
            rel.get(1)
                .or_else(|| rel.get(2))
                .map(|m| m.as_str().split_whitespace().any(|r| r.eq_ignore_ascii_case("next")))
                .unwrap_or(false)
        });

        (is_next && !target.is_empty()).then(|| target.to_string())
    })
}
