//! Content fingerprint (CID) computation.
//!
//! A CID is `sha256-<hex>` over the canonical JSON encoding of a machine
//! representation with its volatile keys removed. Volatile keys are excluded
//! at every nesting level, so the fingerprint is invariant both to mapping
//! insertion order and to any change that touches only excluded keys.

use crate::canonical::{canonicalize, deep_exclude, encode};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Prefix identifying the hash algorithm of a content fingerprint.
pub const CID_PREFIX: &str = "sha256-";

/// Keys excluded from fingerprinting by default.
///
/// `cid` is the fingerprint itself (it cannot be part of its own input) and
/// `links` are derived URLs that vary with deployment, not content.
pub const DEFAULT_EXCLUDE_KEYS: &[&str] = &["cid", "links"];

/// Compute the content fingerprint of a machine representation.
///
/// The exclude-key set is an extension point; callers widening it must use
/// the same set when verifying.
#[must_use]
pub fn compute_cid(value: &Value, exclude_keys: &[&str]) -> String {
    let clean = deep_exclude(value, exclude_keys);
    let canonical = canonicalize(&clean);
    let json = encode(&canonical);
    let digest = Sha256::digest(json.as_bytes());
    format!("{CID_PREFIX}{}", hex::encode(digest))
}

/// Compute a fingerprint over raw bytes, in the same `sha256-<hex>` notation.
///
/// Used for derived textual projections (e.g. the markdown rendering), which
/// occupy a fingerprint space separate from the MR CID.
#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{CID_PREFIX}{}", hex::encode(digest))
}
