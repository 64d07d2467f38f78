//! Hashing System - SHA-256 for Documents and Commit Batches
//!
//! Document hashes detect stale snapshots; batch hashes give a
//! reproducible reference for a set of file writes.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut v = serde_json::to_value(value)?;
    sort_keys(&mut v);
    serde_json::to_string(&v)
}

// preserve_order keeps insertion order, so sorting has to be explicit
fn sort_keys(v: &mut Value) {
    match v {
        Value::Object(map) => {
            map.sort_keys();
            map.values_mut().for_each(sort_keys);
        }
        Value::Array(items) => items.iter_mut().for_each(sort_keys),
        _ => {}
    }
}

/// Hash of a document's raw text, as read from the store.
pub fn document_hash(content: &str) -> String {
    sha256_hex(content.as_bytes())
}

/// Reference for a batch of writes: `sha256(canonical {file: content_hash} + ":" + message)`.
pub fn batch_hash<'a, I>(files: I, message: &str) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let manifest: Map<String, Value> = files
        .into_iter()
        .map(|(file, hash)| (file.to_string(), Value::String(hash.to_string())))
        .collect();
    let canonical = canonical_json(&manifest)?;
    Ok(sha256_hex(format!("{}:{}", canonical, message).as_bytes()))
}

mod hex {
    use std::fmt::Write;

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().fold(String::new(), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_objects() {
        let doc = json!({ "z": [{ "b": 1, "a": 2 }], "a": { "y": true, "x": null } });
        assert_eq!(
            canonical_json(&doc).unwrap(),
            r#"{"a":{"x":null,"y":true},"z":[{"a":2,"b":1}]}"#
        );
    }

    #[test]
    fn test_hash_deterministic() {
        let h1 = document_hash("{}");
        let h2 = document_hash("{}");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_batch_hash_order_independent() {
        let h1 = batch_hash([("a.json", "h1"), ("b.json", "h2")], "msg").unwrap();
        let h2 = batch_hash([("b.json", "h2"), ("a.json", "h1")], "msg").unwrap();
        let h3 = batch_hash([("a.json", "h1"), ("b.json", "h2")], "other").unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }
}
