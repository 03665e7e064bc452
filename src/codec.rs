//! Encoding and decoding of a single on-disk record line.
//!
//! A live record is a line of the form `"key":value\n`. This is almost
//! JSON object syntax with the braces stripped, which lets a tombstoned
//! (`#`-prefixed) record sit on the same line length as the live one it
//! replaces: only the leading byte differs.

use serde_json::Value;

use crate::error::{FileDictError, Result};

/// Leading byte of a live record line.
pub const RECORD_LEADER: u8 = b'"';
/// Leading byte of a tombstone line.
pub const TOMBSTONE_LEADER: u8 = b'#';

/// Encode a `(key, value)` pair into a line: `"key":value\n`.
///
/// Non-ASCII characters in `key` are preserved literally rather than
/// `\u`-escaped, matching the interface's contract that encoding never
/// introduces raw newline bytes outside of JSON string escapes.
pub fn encode(key: &str, value: &Value) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(key)?;
    line.push(b':');
    serde_json::to_writer(&mut line, value)?;
    line.push(b'\n');
    Ok(line)
}

/// Decode a record line (without its trailing `\n`) into `(key, value)`.
///
/// The line is wrapped in `{` / `}` and parsed as a one-entry JSON object.
/// Fails with [`FileDictError::CorruptRecord`] if the result isn't a
/// well-formed single-entry object.
pub fn decode(line: &[u8], offset: u64) -> Result<(String, Value)> {
    let corrupt = |reason: String| FileDictError::CorruptRecord { offset, reason };

    let mut wrapped = Vec::with_capacity(line.len() + 2);
    wrapped.push(b'{');
    wrapped.extend_from_slice(line);
    wrapped.push(b'}');

    let parsed: Value =
        serde_json::from_slice(&wrapped).map_err(|e| corrupt(format!("not valid JSON: {e}")))?;

    match parsed {
        Value::Object(map) => {
            if map.len() != 1 {
                return Err(corrupt(format!(
                    "expected exactly one entry, found {}",
                    map.len()
                )));
            }
            let (key, value) = map.into_iter().next().expect("checked len == 1");
            Ok((key, value))
        }
        other => Err(corrupt(format!("expected an object, found {other}"))),
    }
}

/// Encoded size in bytes of `(key, value)` as written by [`encode`],
/// without actually allocating the line.
pub fn encoded_len(key: &str, value: &Value) -> Result<u64> {
    // `to_vec` is cheap relative to file I/O and keeps this in one place
    // rather than duplicating serde_json's size accounting.
    Ok(encode(key, value)?.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_simple_value() {
        let line = encode("a", &json!("1")).unwrap();
        assert_eq!(line, b"\"a\":\"1\"\n");
        let (k, v) = decode(&line[..line.len() - 1], 0).unwrap();
        assert_eq!(k, "a");
        assert_eq!(v, json!("1"));
    }

    #[test]
    fn round_trips_nested_value() {
        let value = json!({"some": "object", "n": 42, "list": [1, 2, 3], "nil": null});
        let line = encode("key", &value).unwrap();
        let (k, v) = decode(&line[..line.len() - 1], 0).unwrap();
        assert_eq!(k, "key");
        assert_eq!(v, value);
    }

    #[test]
    fn preserves_unicode_literally() {
        let line = encode("héllo", &json!("wörld")).unwrap();
        let text = String::from_utf8(line.clone()).unwrap();
        // non-ASCII bytes appear directly, not as \uXXXX escapes
        assert!(text.contains('é'));
        assert!(text.contains('ö'));
        let (k, v) = decode(&line[..line.len() - 1], 0).unwrap();
        assert_eq!(k, "héllo");
        assert_eq!(v, json!("wörld"));
    }

    #[test]
    fn rejects_malformed_line() {
        let err = decode(b"not json at all", 17).unwrap_err();
        match err {
            FileDictError::CorruptRecord { offset, .. } => assert_eq!(offset, 17),
            other => panic!("expected CorruptRecord, got {other:?}"),
        }
    }

    #[test]
    fn rejects_multi_entry_line() {
        let err = decode(br#""a":1,"b":2"#, 0).unwrap_err();
        assert!(matches!(err, FileDictError::CorruptRecord { .. }));
    }
}
