//! Hashing System - Canonical State Fingerprints
//!
//! Deterministic SHA-256 stamps over canonical JSON. Used to tell whether a
//! cached compatibility matrix still matches the registries and rules it was
//! computed from.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::{Value, to_string};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Fingerprint any serializable value.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// state_hash = sha256(canonical_state + ":" + engine_version)
///
/// Scores depend on engine code as well as inputs, so the engine version
/// is part of the stamp.
pub fn compute_state_hash(
    state: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let combined = format!("{}:{}", canonical_json(state)?, engine_version);
    Ok(sha256_hex(combined.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": {"y": 2, "b": 3}});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":{"b":3,"y":2},"z":1}"#);
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a = json!({"templates": ["poster"], "rules": []});
        let b = json!({"rules": [], "templates": ["poster"]});
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        assert_eq!(fingerprint(&a).unwrap().len(), 64);
    }

    #[test]
    fn test_state_hash_includes_engine_version() {
        let state = json!({"templates": []});
        let v1 = compute_state_hash(&state, "1.0.0").unwrap();
        let v2 = compute_state_hash(&state, "1.1.0").unwrap();
        assert_ne!(v1, v2);
        assert_eq!(v1, compute_state_hash(&state, "1.0.0").unwrap());
    }
}
