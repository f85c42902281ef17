//! Canonical JSON encoding.
//!
//! Hash reproducibility rests entirely on this encoder: two structurally
//! equal values must encode to the same bytes no matter how their maps were
//! built.  Rules (frozen, versioned through `CHAIN_ALGO`):
//!
//!   - scalars render as their JSON literal (`null`, `true`, numbers and
//!     strings exactly as serde_json formats them)
//!   - arrays render element-wise in the given order
//!   - objects render with keys sorted by byte order, values encoded
//!     recursively
//!   - no whitespace anywhere
//!
//! IMPORTANT: never pretty-print, and never change a rule in place.  A new
//! rule needs a new `CHAIN_ALGO` identifier.

use serde::Serialize;
use serde_json::Value;

use safereport_contracts::error::EvidenceResult;

/// Encode `value` canonically.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Convert `value` to JSON and encode it canonically.
pub fn encode_serializable<T: Serialize>(value: &T) -> EvidenceResult<String> {
    let v = serde_json::to_value(value)?;
    Ok(encode(&v))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // `Value`'s Display is serde_json's compact writer: quoted and escaped.
    out.push_str(&Value::String(s.to_owned()).to_string());
}
