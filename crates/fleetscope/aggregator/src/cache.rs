//! Holder of the last completed fleet summary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetscope_types::FleetSummary;
use parking_lot::RwLock;

#[derive(Clone)]
struct CacheEntry {
    summary: Arc<FleetSummary>,
    updated_at: DateTime<Utc>,
}

/// What a reader gets back from the cache.
#[derive(Debug, Clone)]
pub enum SnapshotView {
    /// No cycle has completed yet.
    NoData,

    Available {
        summary: Arc<FleetSummary>,
        updated_at: DateTime<Utc>,
        /// Time since the summary was stored.
        staleness: Duration,
        /// At least one host failed during the cycle that produced it.
        partial_failure: bool,
    },
}

impl SnapshotView {
    pub fn summary(&self) -> Option<&Arc<FleetSummary>> {
        match self {
            SnapshotView::NoData => None,
            SnapshotView::Available { summary, .. } => Some(summary),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SnapshotView::Available { .. })
    }
}

/// Single-slot cache of the latest [`FleetSummary`].
///
/// The stored summary is immutable and shared; replacing it swaps one
/// pointer under the lock, so readers see either the old or the new
/// summary in full.
#[derive(Default)]
pub struct SnapshotCache {
    current: RwLock<Option<CacheEntry>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new summary, returning the shared handle to it.
    pub fn replace(&self, summary: FleetSummary) -> Arc<FleetSummary> {
        let entry = CacheEntry {
            summary: Arc::new(summary),
            updated_at: Utc::now(),
        };
        let shared = entry.summary.clone();
        let previous = self.current.write().replace(entry);
        // The old summary is released outside the lock.
        drop(previous);
        shared
    }

    /// Latest summary, if any.
    pub fn get(&self) -> Option<Arc<FleetSummary>> {
        self.current.read().as_ref().map(|e| e.summary.clone())
    }

    /// When the latest summary was stored.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.current.read().as_ref().map(|e| e.updated_at)
    }

    /// Latest summary together with its staleness.
    pub fn view(&self) -> SnapshotView {
        let entry = self.current.read().clone();
        match entry {
            None => SnapshotView::NoData,
            Some(entry) => {
                let staleness = (Utc::now() - entry.updated_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                SnapshotView::Available {
                    partial_failure: entry.summary.is_partial(),
                    summary: entry.summary,
                    updated_at: entry.updated_at,
                    staleness,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscope_types::{HostId, HostSnapshot};

    #[test]
    fn test_empty_cache() {
        let cache = SnapshotCache::new();
        assert!(cache.get().is_none());
        assert!(cache.last_updated().is_none());
        assert!(matches!(cache.view(), SnapshotView::NoData));
    }

    #[test]
    fn test_replace_and_view() {
        let cache = SnapshotCache::new();
        let summary = FleetSummary::from_hosts(vec![
            HostSnapshot::success(HostId::new("a"), Vec::new(), Vec::new()),
            HostSnapshot::failed(HostId::new("b"), "down"),
        ]);

        let stored = cache.replace(summary.clone());
        assert_eq!(*stored, summary);
        assert_eq!(*cache.get().unwrap(), summary);

        match cache.view() {
            SnapshotView::Available {
                summary: viewed,
                partial_failure,
                staleness,
                ..
            } => {
                assert_eq!(*viewed, summary);
                assert!(partial_failure);
                assert!(staleness < Duration::from_secs(5));
            }
            SnapshotView::NoData => panic!("expected data"),
        }
    }

    #[test]
    fn test_readers_keep_their_copy() {
        let cache = SnapshotCache::new();
        cache.replace(FleetSummary::from_hosts(Vec::new()));
        let held = cache.get().unwrap();

        cache.replace(FleetSummary::from_hosts(vec![HostSnapshot::failed(
            HostId::new("x"),
            "down",
        )]));

        assert!(held.hosts.is_empty());
        assert_eq!(cache.get().unwrap().hosts.len(), 1);
    }
}
