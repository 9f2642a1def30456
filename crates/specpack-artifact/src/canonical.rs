//! Canonical JSON encoding
//!
//! Byte-stable text for any [`serde_json::Value`]. Object members are written
//! in the order they were inserted (the workspace enables serde_json's
//! `preserve_order`), so the encoding never depends on hash-map enumeration.
//! Numbers use serde_json's fixed textual form and strings a fixed escape set.
//!
//! No wall-clock value may end up in canonical output. Callers that need a
//! timestamp in a reproducible artifact use [`PLACEHOLDER_TIMESTAMP`].

use serde::Serialize;
use serde_json::Value;

/// The single timestamp reproducible artifacts may embed (the zip epoch).
pub const PLACEHOLDER_TIMESTAMP: &str = "1980-01-01T00:00:00Z";

/// Encode a value as compact canonical JSON
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_compact(&mut out, value);
    out
}

/// Encode any serializable value as compact canonical JSON
///
/// Struct fields are emitted in declaration order.
///
/// # Errors
/// Returns error if the value has no JSON representation (e.g. a map with
/// non-string keys). This is a programmer error, not an input error.
pub fn canonicalize_serializable<T>(value: &T) -> Result<String, CanonicalError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value)?;
    Ok(canonicalize(&value))
}

/// Encode a value as an indented, newline-terminated document
///
/// Used when documents are synthesized into a pack; the multi-line form keeps
/// line-based patches reviewable.
#[must_use]
pub fn canonical_document(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_pretty(&mut out, value, 0);
    out.push('\n');
    out.into_bytes()
}

fn write_compact(out: &mut String, value: &Value) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_compact(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_compact(out, item);
            }
            out.push('}');
        }
        scalar => write_scalar(out, scalar),
    }
}

fn write_pretty(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Array(items) if !items.is_empty() => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                newline(out, depth + 1);
                write_pretty(out, item, depth + 1);
            }
            newline(out, depth);
            out.push(']');
        }
        Value::Object(map) if !map.is_empty() => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                newline(out, depth + 1);
                write_string(out, key);
                out.push_str(": ");
                write_pretty(out, item, depth + 1);
            }
            newline(out, depth);
            out.push('}');
        }
        Value::Array(_) => out.push_str("[]"),
        Value::Object(_) => out.push_str("{}"),
        scalar => write_scalar(out, scalar),
    }
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_scalar(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(_) | Value::Object(_) => write_compact(out, value),
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Errors raised when a value has no canonical JSON form
#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    /// Value could not be converted to JSON
    #[error("value is not representable as JSON: {0}")]
    NotRepresentable(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn keys_keep_source_order() {
        let value: Value = serde_json::from_str(r#"{"z":1,"a":2,"m":{"y":true,"b":null}}"#).unwrap();
        assert_eq!(canonicalize(&value), r#"{"z":1,"a":2,"m":{"y":true,"b":null}}"#);
    }

    #[test]
    fn numbers_have_fixed_form() {
        let value = json!([1, -2, 1.5, 1.0, 1e21]);
        assert_eq!(canonicalize(&value), "[1,-2,1.5,1.0,1e21]");
    }

    #[test]
    fn strings_are_escaped() {
        let value = json!("a\"b\\c\n\u{01}é");
        assert_eq!(canonicalize(&value), "\"a\\\"b\\\\c\\n\\u0001é\"");
    }

    #[test]
    fn document_form_is_indented_and_terminated() {
        let value = json!({"name": "x", "tags": ["a"], "empty": {}, "none": []});
        let text = String::from_utf8(canonical_document(&value)).unwrap();
        assert_eq!(
            text,
            "{\n  \"name\": \"x\",\n  \"tags\": [\n    \"a\"\n  ],\n  \"empty\": {},\n  \"none\": []\n}\n"
        );
    }

    #[test]
    fn document_form_parses_back_to_same_value() {
        let value = json!({"b": [1, {"c": "d"}], "a": null});
        let parsed: Value = serde_json::from_slice(&canonical_document(&value)).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn serializable_structs_follow_field_order() {
        #[derive(Serialize)]
        struct Entry {
            path: &'static str,
            size: u64,
        }
        let text = canonicalize_serializable(&[Entry { path: "a", size: 3 }]).unwrap();
        assert_eq!(text, r#"[{"path":"a","size":3}]"#);
    }

    proptest! {
        #[test]
        fn compact_form_is_valid_json_for_strings(s in ".*") {
            let value = Value::String(s);
            let text = canonicalize(&value);
            let parsed: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(parsed, value);
        }

        #[test]
        fn canonicalize_is_stable_across_reparse(keys in proptest::collection::vec("[a-z]{1,6}", 0..8)) {
            let mut map = serde_json::Map::new();
            for (i, k) in keys.iter().enumerate() {
                map.insert(k.clone(), json!(i));
            }
            let value = Value::Object(map);
            let once = canonicalize(&value);
            let reparsed: Value = serde_json::from_str(&once).unwrap();
            prop_assert_eq!(canonicalize(&reparsed), once);
        }
    }
}
