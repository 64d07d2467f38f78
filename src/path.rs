//! Path Model - Canonical Token Addressing
//!
//! Canonical paths are dot-separated segments matching
//! `[A-Za-z][A-Za-z0-9_-]*`. Legacy slash-delimited paths are accepted
//! everywhere a path is looked up and normalized first.

use serde_json::Value;

/// Replace `/` and `\` separators with `.`.
pub fn normalize(path: &str) -> String {
    path.trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '.' } else { c })
        .collect()
}

/// True if `path` satisfies the canonical grammar.
pub fn is_canonical(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(is_canonical_segment)
}

fn is_canonical_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}

/// A string is a reference iff it is longer than two characters and
/// wrapped in braces.
pub fn is_reference(raw: &str) -> bool {
    raw.len() > 2 && raw.starts_with('{') && raw.ends_with('}')
}

/// Strip the surrounding braces, if any.
pub fn extract_reference_path(raw: &str) -> &str {
    let raw = raw.strip_prefix('{').unwrap_or(raw);
    raw.strip_suffix('}').unwrap_or(raw)
}

pub fn format_as_reference(path: &str) -> String {
    format!("{{{}}}", path)
}

/// Normalized reference target of a token value, or `None` for literals.
pub fn reference_target(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_reference(s) => Some(normalize(extract_reference_path(s))),
        _ => None,
    }
}

/// Split off the first segment: `"color.brand.x"` -> `("color", Some("brand.x"))`.
pub fn split_first(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}
