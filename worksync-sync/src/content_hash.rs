//! Content identity: SHA-256 digests of text, files, and structured values.
//!
//! Structured values are hashed over a canonical JSON rendering in which
//! object keys are sorted at every depth, so neither field declaration order
//! nor nested map order changes a digest.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// Hex SHA-256 digest of raw bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Hex SHA-256 digest of raw text content.
pub fn hash_str(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// Digest of the canonical JSON form of `value`.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<String, SyncError> {
    Ok(hash_json(&serde_json::to_value(value)?))
}

/// Digest of an already-built JSON value. Infallible.
pub fn hash_json(value: &Value) -> String {
    hash_str(&canonicalize(value.clone()).to_string())
}

/// Digest of the file at `path`.
pub fn hash_file(path: &Path) -> Result<String, SyncError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(hash_bytes(&bytes))
}

/// Compact JSON with object keys sorted recursively.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, SyncError> {
    let value = serde_json::to_value(value)?;
    Ok(canonicalize(value).to_string())
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
