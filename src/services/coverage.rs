//! Expected-job-count cache shared by request handlers and the refresh task.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct CoverageState {
    versions: BTreeSet<String>,
    expected: HashMap<String, u64>,
}

/// Versions seen so far and the number of distinct jobs expected for each.
///
/// Entries are never invalidated. A count goes stale when new job names appear
/// for a version, until the next refresh raises it.
#[derive(Clone, Default)]
pub struct CoverageCache {
    state: Arc<RwLock<CoverageState>>,
}

impl CoverageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a version as seen. Returns true when it was not tracked yet.
    pub async fn record_version(&self, version: &str) -> bool {
        if self.state.read().await.versions.contains(version) {
            return false;
        }
        self.state.write().await.versions.insert(version.to_string())
    }

    /// Cached expected job count for a version.
    pub async fn expected(&self, version: &str) -> Option<u64> {
        self.state.read().await.expected.get(version).copied()
    }

    /// Store a lazily computed count unless another task stored one first.
    /// Returns the count now in the cache.
    pub async fn fill_expected(&self, version: &str, count: u64) -> u64 {
        let mut state = self.state.write().await;
        *state.expected.entry(version.to_string()).or_insert(count)
    }

    /// Store a freshly computed count. Job names never disappear from a
    /// version, so a lower count comes from an older refresh and is ignored.
    pub async fn store_expected(&self, version: &str, count: u64) {
        let mut state = self.state.write().await;
        let stored = state.expected.entry(version.to_string()).or_insert(count);
        *stored = (*stored).max(count);
    }

    /// Snapshot of all tracked versions, in order.
    pub async fn tracked_versions(&self) -> Vec<String> {
        self.state.read().await.versions.iter().cloned().collect()
    }

    /// All known versions as a JSON-ready set.
    pub async fn version_set(&self) -> BTreeMap<String, bool> {
        self.state
            .read()
            .await
            .versions
            .iter()
            .map(|v| (v.clone(), true))
            .collect()
    }
}
