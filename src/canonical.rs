//! Canonical JSON encoding.
//!
//! Every hash and signature in firestd is computed over the bytes produced
//! here. The rules are:
//!
//! - object keys sorted by their UTF-8 bytes, at every nesting level
//! - `,` and `:` separators with no whitespace anywhere
//! - strings escaped the way `serde_json` escapes them
//! - numbers written the way `serde_json` writes them (integers verbatim,
//!   floats as the shortest text that round-trips)
//!
//! The writer walks the value itself instead of relying on the ordering of
//! `serde_json::Map`, which changes when `preserve_order` is enabled anywhere
//! in the dependency graph.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Encodes any serializable value as canonical JSON bytes.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    to_canonical_bytes(&value)
}

/// Encodes a JSON value as canonical bytes.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(128);
    write_value(value, &mut out)?;
    Ok(out)
}

/// Canonical encoding as a `String`.
pub fn to_canonical_string(value: &Value) -> Result<String> {
    let bytes = to_canonical_bytes(value)?;
    // the writer only emits serde_json output and ASCII punctuation
    Ok(String::from_utf8(bytes)?)
}

/// Returns a copy of `value` whose objects are rebuilt in sorted key order.
///
/// Pretty printers that follow map order then emit key-sorted output.
pub fn sorted_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sorted_value(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_value).collect()),
        other => other.clone(),
    }
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(val, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_and_compact() {
        let v = json!({"b": 1, "a": {"z": [1, 2, {"y": null, "x": true}], "c": "s"}});
        let s = to_canonical_string(&v).unwrap();
        assert_eq!(s, r#"{"a":{"c":"s","z":[1,2,{"x":true,"y":null}]},"b":1}"#);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut m1 = Map::new();
        m1.insert("spec".into(), json!("ros-v2"));
        m1.insert("cert_name".into(), json!("qa"));
        m1.insert("v".into(), json!(1));
        let mut m2 = Map::new();
        m2.insert("v".into(), json!(1));
        m2.insert("spec".into(), json!("ros-v2"));
        m2.insert("cert_name".into(), json!("qa"));
        assert_eq!(
            to_canonical_bytes(&Value::Object(m1)).unwrap(),
            to_canonical_bytes(&Value::Object(m2)).unwrap()
        );
    }

    #[test]
    fn test_string_escaping_and_floats() {
        let v = json!({"t": "line\n\"q\"", "f": 0.5, "n": -3});
        let s = to_canonical_string(&v).unwrap();
        assert_eq!(s, r#"{"f":0.5,"n":-3,"t":"line\n\"q\""}"#);
    }

    #[test]
    fn test_serializable_struct() {
        #[derive(Serialize)]
        struct Payload {
            zeta: u8,
            alpha: &'static str,
        }
        let bytes = canonical_json_bytes(&Payload { zeta: 2, alpha: "x" }).unwrap();
        assert_eq!(bytes, br#"{"alpha":"x","zeta":2}"#.to_vec());
    }

    #[test]
    fn test_sorted_value_orders_nested_maps() {
        let v = json!({"b": {"d": 1, "c": 2}, "a": 0});
        let pretty = serde_json::to_string(&sorted_value(&v)).unwrap();
        assert_eq!(pretty, r#"{"a":0,"b":{"c":2,"d":1}}"#);
    }
}
