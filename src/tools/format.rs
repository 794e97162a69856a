//! Plain-text rendering helpers shared by the tools.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

fn whitespace_regex() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Remove markup and decode the common entities, keeping line structure.
pub fn strip_html(html: &str) -> String {
    let text = tag_regex().replace_all(html, "");
    decode_entities(&text).trim().to_string()
}

/// Like [`strip_html`], but collapses all whitespace to single spaces.
pub fn strip_html_inline(html: &str) -> String {
    let text = strip_html(html);
    whitespace_regex().replace_all(&text, " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// Render a Canvas ISO-8601 timestamp; `N/A` when absent.
pub fn format_date(value: Option<&str>) -> String {
    match value {
        None | Some("") => "N/A".to_string(),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| {
                dt.with_timezone(&Utc)
                    .format("%Y-%m-%d %H:%M UTC")
                    .to_string()
            })
            .unwrap_or_else(|_| raw.to_string()),
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// `12` rather than `12.0`, but `9.5` stays.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// String field of a JSON record.
pub fn text<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// String field, or `default` when missing or empty.
pub fn text_or<'a>(record: &'a Value, key: &str, default: &'a str) -> &'a str {
    text(record, key).filter(|s| !s.is_empty()).unwrap_or(default)
}

/// Scalar field rendered for display (IDs, counts, scores).
pub fn scalar(record: &Value, key: &str, default: &str) -> String {
    match record.get(key) {
        Some(Value::Number(n)) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

pub fn flag(record: &Value, key: &str) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Join rendered entries under a heading with blank lines between them.
pub fn listing(heading: &str, entries: &[String]) -> String {
    format!("{}:\n\n{}", heading, entries.join("\n\n"))
}
