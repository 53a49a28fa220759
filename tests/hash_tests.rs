use firestd::canonical::{canonical_json_bytes, to_canonical_string};
use firestd::hash::{sha256_hex, short_hex_digest, SHORT_ID_HEX_LEN};
use serde_json::json;

#[test]
fn test_sha256_of_empty_input() {
    assert_eq!(
        sha256_hex(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_short_digest_is_prefix() {
    let short = short_hex_digest(b"payload");
    assert_eq!(short.len(), SHORT_ID_HEX_LEN);
    assert!(sha256_hex(b"payload").starts_with(&short));
}

#[test]
fn test_canonical_json_ignores_key_order() {
    let a = json!({"b": 1, "a": {"y": [1, 2], "x": "s"}});
    let b = json!({"a": {"x": "s", "y": [1, 2]}, "b": 1});
    assert_eq!(
        canonical_json_bytes(&a).unwrap(),
        canonical_json_bytes(&b).unwrap()
    );
    assert_eq!(
        to_canonical_string(&a).unwrap(),
        r#"{"a":{"x":"s","y":[1,2]},"b":1}"#
    );
}

#[test]
fn test_canonical_json_keeps_array_order_and_unicode() {
    let v = json!({"k": ["z", "a"], "n": "é"});
    assert_eq!(to_canonical_string(&v).unwrap(), "{\"k\":[\"z\",\"a\"],\"n\":\"é\"}");
}
