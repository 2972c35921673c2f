//! Canonical JSON encoding for content fingerprinting.
//!
//! Fingerprints must be stable regardless of the key insertion order of any
//! mapping, so hashing never operates on the wire body. Instead the value is
//! passed through [`canonicalize`] (recursive byte-lexicographic key sort),
//! optionally [`deep_exclude`] (volatile-key removal at every nesting level),
//! and [`encode`] (compact, Unicode-preserving serialization).
//!
//! The canonical form is used *only* for hashing. Wire bodies keep their
//! human-friendly field order.

use serde_json::{Map, Value};

/// Recursively sort every object's keys byte-lexicographically.
///
/// Arrays retain element order; scalars pass through unchanged. The result is
/// structurally equal to the input, differing only in key order.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        scalar => scalar.clone(),
    }
}

/// Remove the named keys from every object at every nesting level.
///
/// Exclusion applies wherever a key appears, not just at the top level;
/// collaborator-injected substructures may repeat volatile key names.
#[must_use]
pub fn deep_exclude(value: &Value, exclude_keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map {
                if exclude_keys.iter().any(|k| k == key) {
                    continue;
                }
                out.insert(key.clone(), deep_exclude(child, exclude_keys));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| deep_exclude(item, exclude_keys))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

/// Serialize a canonicalized value to its compact text encoding.
///
/// Keys are emitted in map iteration order, which [`canonicalize`] has made
/// sorted, and non-ASCII characters are not escaped, so two
/// structurally-equal canonicalized inputs always encode to identical bytes.
#[must_use]
pub fn encode(value: &Value) -> String {
    // A serde_json::Value cannot fail to serialize.
    serde_json::to_string(value).unwrap_or_default()
}
