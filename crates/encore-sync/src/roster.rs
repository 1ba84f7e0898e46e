//! # Roster Service
//!
//! Dancer roster reads with a degraded-mode backup snapshot.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Roster Data Flow                                  │
//! │                                                                         │
//! │  refresh() ──► GET /booth/dancers                                      │
//! │                   │                                                     │
//! │        success────┤                                                     │
//! │            │      └──failure──► error to caller; cache + snapshot      │
//! │            ▼                    keep their last good contents          │
//! │     cache = result                                                     │
//! │            │                                                            │
//! │            └── non-empty? ──► snapshot overwritten WHOLESALE with      │
//! │                               the minimal projection (never merged)    │
//! │                                                                         │
//! │  filter(pred) ──► cache only. Never a network call: re-fetching the    │
//! │                   full remote list per filter call is wasted work,     │
//! │                   not a consistency guarantee.                         │
//! │                                                                         │
//! │  fallback() ──► snapshot store. Restoration is the CALLER's decision;  │
//! │                 this service only keeps the last good state alive.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use encore_core::{Dancer, DancerSummary};
use encore_store::SnapshotStore;

use crate::api::RosterSource;
use crate::error::SyncResult;

/// Roster reads, cached filtering, and the backup snapshot side effect.
pub struct RosterService {
    source: Arc<dyn RosterSource>,
    snapshot: SnapshotStore,
    cached: RwLock<Vec<Dancer>>,
}

impl RosterService {
    pub fn new(source: Arc<dyn RosterSource>, snapshot: SnapshotStore) -> Self {
        RosterService {
            source,
            snapshot,
            cached: RwLock::new(Vec::new()),
        }
    }

    /// Fetches the full roster, updating the cache and (when non-empty)
    /// overwriting the backup snapshot.
    pub async fn refresh(&self) -> SyncResult<Vec<Dancer>> {
        let roster = self.source.list_dancers().await?;

        if roster.is_empty() {
            // An empty list is a valid response but never clobbers the
            // last known-good snapshot.
            debug!("Roster refresh returned empty list, snapshot untouched");
        } else {
            let projection: Vec<DancerSummary> =
                roster.iter().map(DancerSummary::from).collect();
            if let Err(e) = self.snapshot.save(&projection) {
                warn!(error = %e, "Failed to write roster snapshot");
            }
        }

        *self.cached.write().await = roster.clone();
        Ok(roster)
    }

    /// Returns the most recently fetched roster.
    pub async fn cached(&self) -> Vec<Dancer> {
        self.cached.read().await.clone()
    }

    /// Filters the most recently fetched roster. Never touches the network.
    pub async fn filter<P>(&self, predicate: P) -> Vec<Dancer>
    where
        P: Fn(&Dancer) -> bool,
    {
        self.cached
            .read()
            .await
            .iter()
            .filter(|d| predicate(d))
            .cloned()
            .collect()
    }

    /// Last known-good projection for degraded-mode display.
    pub fn fallback(&self) -> SyncResult<Option<Vec<DancerSummary>>> {
        Ok(self.snapshot.load()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::error::SyncError;

    struct FakeRoster {
        responses: Mutex<Vec<SyncResult<Vec<Dancer>>>>,
        calls: AtomicUsize,
    }

    impl FakeRoster {
        fn new(responses: Vec<SyncResult<Vec<Dancer>>>) -> Arc<Self> {
            Arc::new(FakeRoster {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RosterSource for FakeRoster {
        async fn list_dancers(&self) -> SyncResult<Vec<Dancer>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn dancer(id: &str, name: &str, active: bool) -> Dancer {
        Dancer {
            id: id.into(),
            name: name.into(),
            tagline: String::new(),
            active,
        }
    }

    fn service(source: Arc<FakeRoster>) -> (tempfile::TempDir, RosterService) {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotStore::new(dir.path().join("roster.json"));
        (dir, RosterService::new(source, snapshot))
    }

    #[tokio::test]
    async fn test_refresh_saves_snapshot_wholesale() {
        let source = FakeRoster::new(vec![
            Ok(vec![dancer("1", "Nova", true), dancer("2", "Vesper", false)]),
            Ok(vec![dancer("3", "Lux", true)]),
        ]);
        let (_dir, service) = service(source);

        service.refresh().await.unwrap();
        service.refresh().await.unwrap();

        let snapshot = service.fallback().unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Lux");
    }

    #[tokio::test]
    async fn test_empty_refresh_keeps_snapshot() {
        let source = FakeRoster::new(vec![
            Ok(vec![dancer("1", "Nova", true)]),
            Ok(vec![]),
        ]);
        let (_dir, service) = service(source);

        service.refresh().await.unwrap();
        service.refresh().await.unwrap();

        // Cache reflects the empty fetch, snapshot keeps the last good list.
        assert!(service.cached().await.is_empty());
        let snapshot = service.fallback().unwrap().unwrap();
        assert_eq!(snapshot[0].name, "Nova");
    }

    #[tokio::test]
    async fn test_filter_uses_cache_not_network() {
        let source = FakeRoster::new(vec![Ok(vec![
            dancer("1", "Nova", true),
            dancer("2", "Vesper", false),
        ])]);
        let (_dir, service) = service(source.clone());

        service.refresh().await.unwrap();

        let active = service.filter(|d| d.active).await;
        let inactive = service.filter(|d| !d.active).await;

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Nova");
        assert_eq!(inactive.len(), 1);
        // One fetch total: filtering never re-fetched.
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_preserves_cache_and_snapshot() {
        let source = FakeRoster::new(vec![
            Ok(vec![dancer("1", "Nova", true)]),
            Err(SyncError::Network("server unreachable".into())),
        ]);
        let (_dir, service) = service(source);

        service.refresh().await.unwrap();
        assert!(service.refresh().await.is_err());

        assert_eq!(service.cached().await.len(), 1);
        assert_eq!(service.fallback().unwrap().unwrap()[0].name, "Nova");
    }
}
