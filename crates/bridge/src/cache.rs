//! Last workflow state reported by the editor panel.
//!
//! Read when the panel is absent or silent past the call deadline.
//! Staleness is a property of how a value is read, not of the value itself,
//! so the cache stores only the document; callers mark replies stale.

use serde_json::Value;
use std::sync::Mutex;

/// Single-slot cache holding the most recent panel-reported document.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    latest: Mutex<Option<Value>>,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached document with a fresh panel report.
    pub fn record(&self, document: Value) {
        let mut latest = self.latest.lock().expect("snapshot cache lock");
        *latest = Some(document);
    }

    /// Return a copy of the cached document, if any report has arrived yet.
    pub fn latest(&self) -> Option<Value> {
        self.latest.lock().expect("snapshot cache lock").clone()
    }

    /// True until the first panel report lands.
    pub fn is_empty(&self) -> bool {
        self.latest.lock().expect("snapshot cache lock").is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let cache = SnapshotCache::new();
        assert!(cache.is_empty());
        assert!(cache.latest().is_none());
    }

    #[test]
    fn record_overwrites_previous_snapshot() {
        let cache = SnapshotCache::new();
        cache.record(serde_json::json!({"id": "wf1"}));
        cache.record(serde_json::json!({"id": "wf2"}));

        assert_eq!(cache.latest(), Some(serde_json::json!({"id": "wf2"})));
        assert!(!cache.is_empty());
    }
}
