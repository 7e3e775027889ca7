//! Canonical JSON serialization for hash computation.
//!
//! Audit record hashes must be reproducible bit-for-bit across processes and
//! re-verification runs, so hashing goes through an RFC 8785-style canonical
//! form: lexicographically sorted object keys, arrays in original order, and
//! stable number formatting. Identical logical content always canonicalizes
//! to the identical byte string.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::errors::{SarError, SarResult};

/// Canonicalize a JSON value into its stable string form.
pub fn canonical_json(value: &Value) -> SarResult<String> {
    let mut output = String::new();
    serialize_value(value, &mut output)?;
    Ok(output)
}

/// SHA-256 hex digest of the canonical form of `value`.
pub fn hash_canonical(value: &Value) -> SarResult<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn serialize_value(value: &Value, output: &mut String) -> SarResult<()> {
    match value {
        Value::Object(map) => {
            output.push('{');

            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                serialize_string(key, output)?;
                output.push(':');
                serialize_value(&map[*key], output)?;
            }

            output.push('}');
        }
        Value::Array(arr) => {
            output.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                serialize_value(item, output)?;
            }
            output.push(']');
        }
        Value::String(s) => serialize_string(s, output)?,
        Value::Number(n) => serialize_number(n, output)?,
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Null => output.push_str("null"),
    }
    Ok(())
}

fn serialize_string(s: &str, output: &mut String) -> SarResult<()> {
    output.push('"');

    for ch in s.chars() {
        match ch {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{08}' => output.push_str("\\b"),
            '\u{0C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            ch if ch.is_control() => {
                write!(output, "\\u{:04x}", ch as u32)
                    .map_err(|e| SarError::internal(e.to_string()))?;
            }
            ch => output.push(ch),
        }
    }

    output.push('"');
    Ok(())
}

/// Numbers follow ECMAScript `Number.prototype.toString()` behaviour: whole
/// values in integer form, everything else in minimal decimal form.
fn serialize_number(num: &serde_json::Number, output: &mut String) -> SarResult<()> {
    if let Some(i) = num.as_i64() {
        write!(output, "{i}").map_err(|e| SarError::internal(e.to_string()))?;
    } else if let Some(u) = num.as_u64() {
        write!(output, "{u}").map_err(|e| SarError::internal(e.to_string()))?;
    } else if let Some(f) = num.as_f64() {
        if f.is_nan() || f.is_infinite() {
            return Err(SarError::internal(
                "non-finite number cannot be canonicalized",
            ));
        }
        if f.fract() == 0.0 && f.abs() < 1e15 && (f.abs() >= 1e-4 || f == 0.0) {
            write!(output, "{}", f as i64).map_err(|e| SarError::internal(e.to_string()))?;
        } else {
            write!(output, "{f}").map_err(|e| SarError::internal(e.to_string()))?;
        }
    } else {
        return Err(SarError::internal("invalid number format"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_key_sorting() {
        let input = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonical_json(&input).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_nested_objects_sorted_recursively() {
        let input = json!({
            "outer": {"z": 1, "a": {"c": 3, "b": 2}},
            "first": 1
        });
        assert_eq!(
            canonical_json(&input).unwrap(),
            r#"{"first":1,"outer":{"a":{"b":2,"c":3},"z":1}}"#
        );
    }

    #[test]
    fn test_arrays_preserve_order() {
        let input = json!({"array": [3, 1, 2], "another": ["z", "a", "m"]});
        assert_eq!(
            canonical_json(&input).unwrap(),
            r#"{"another":["z","a","m"],"array":[3,1,2]}"#
        );
    }

    #[test]
    fn test_number_formatting_is_stable() {
        let input = json!({"int": 42, "float": 3.14, "zero": 0.0, "whole": 5.0});
        assert_eq!(
            canonical_json(&input).unwrap(),
            r#"{"float":3.14,"int":42,"whole":5,"zero":0}"#
        );
    }

    #[test]
    fn test_hash_is_deterministic() {
        let input = json!({
            "step_name": "analyze_patterns",
            "confidence": 0.9,
            "reasoning": {"typologies": ["structuring", "layering"]}
        });

        let h1 = hash_canonical(&input).unwrap();
        let h2 = hash_canonical(&input).unwrap();
        let h3 = hash_canonical(&input).unwrap();

        assert_eq!(h1, h2);
        assert_eq!(h2, h3);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_key_order_does_not_change_hash() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        assert_eq!(hash_canonical(&a).unwrap(), hash_canonical(&b).unwrap());
    }

    #[test]
    fn test_string_escaping() {
        let input = json!({"quotes": "He said \"Hello\"", "newline": "line1\nline2"});
        assert_eq!(
            canonical_json(&input).unwrap(),
            r#"{"newline":"line1\nline2","quotes":"He said \"Hello\""}"#
        );
    }
}
