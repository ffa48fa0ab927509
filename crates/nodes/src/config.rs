//! Helpers for reading loosely-typed node configuration.

use serde_json::{Map, Value};
use uuid::Uuid;

/// Read `key` as text. Missing and `null` read as empty; other scalars are
/// rendered as their JSON text.
pub fn string_field(config: &Map<String, Value>, key: &str) -> String {
    match config.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Read `key` only if it holds a string.
pub fn optional_str<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// Read `key` as a finite number, accepting numeric strings.
pub fn number_field(config: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match config.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Keep at most `max` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_owned(),
        None => s.to_owned(),
    }
}

/// Parse a canonical hyphenated UUID (`8-4-4-4-12` hex digits).
///
/// Simple, braced and URN forms are refused.
pub fn parse_uuid(s: &str) -> Option<Uuid> {
    if s.len() != 36 {
        return None;
    }
    Uuid::try_parse(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn string_field_renders_scalars() {
        let config = cfg(json!({ "a": "x", "b": 5, "c": null }));
        assert_eq!(string_field(&config, "a"), "x");
        assert_eq!(string_field(&config, "b"), "5");
        assert_eq!(string_field(&config, "c"), "");
        assert_eq!(string_field(&config, "missing"), "");
    }

    #[test]
    fn number_field_accepts_numeric_strings() {
        let config = cfg(json!({ "n": 12.5, "s": " 40 ", "bad": "soon", "nan": "NaN" }));
        assert_eq!(number_field(&config, "n"), Some(12.5));
        assert_eq!(number_field(&config, "s"), Some(40.0));
        assert_eq!(number_field(&config, "bad"), None);
        assert_eq!(number_field(&config, "nan"), None);
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn only_hyphenated_uuids_parse() {
        assert!(parse_uuid("67e55044-10b1-426f-9247-bb680e5fe0c8").is_some());
        assert!(parse_uuid("67e5504410b1426f9247bb680e5fe0c8").is_none());
        assert!(parse_uuid("{67e55044-10b1-426f-9247-bb680e5fe0c8}").is_none());
        assert!(parse_uuid("not-a-uuid").is_none());
        assert!(parse_uuid("").is_none());
    }
}
