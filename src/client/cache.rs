//! Consumer-side cache of fingerprints and last-seen bodies.
//!
//! Keyed by resource path (the MR and its rendered projection occupy
//! distinct fingerprint spaces, so they cache under distinct keys). Updated
//! only on non-304 responses; consulted to populate `If-None-Match` on the
//! next read and `If-Match` on the next write. Staleness beyond explicit
//! invalidation is an accepted tradeoff, not a bug.

use parking_lot::Mutex;
use std::collections::HashMap;

/// One cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The fingerprint the service reported for this body.
    pub fingerprint: String,
    /// The exact body last received with a 200.
    pub last_body: String,
}

/// Thread-safe fingerprint+body cache.
#[derive(Default)]
pub struct ClientCache {
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl ClientCache {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().get(key).cloned()
    }

    #[must_use]
    pub fn fingerprint(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key).map(|e| e.fingerprint.clone())
    }

    pub fn store(&self, key: &str, fingerprint: String, last_body: String) {
        self.inner.lock().insert(
            key.to_string(),
            CacheEntry {
                fingerprint,
                last_body,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.inner.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_get() {
        let cache = ClientCache::default();
        assert!(cache.get("7").is_none());
        cache.store("7", "sha256-a".into(), "{}".into());
        assert_eq!(cache.fingerprint("7").as_deref(), Some("sha256-a"));
        assert_eq!(cache.get("7").unwrap().last_body, "{}");
    }

    #[test]
    fn mr_and_rendered_are_distinct_keys() {
        let cache = ClientCache::default();
        cache.store("7", "sha256-mr".into(), "{}".into());
        cache.store("7/rendered", "sha256-md".into(), "# t\n".into());
        assert_ne!(cache.fingerprint("7"), cache.fingerprint("7/rendered"));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ClientCache::default();
        cache.store("7", "sha256-a".into(), "{}".into());
        cache.invalidate("7");
        assert!(cache.get("7").is_none());
    }
}
