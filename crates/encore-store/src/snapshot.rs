//! # Roster Backup Snapshot
//!
//! Write-through mirror of the last known-good dancer roster.
//!
//! The snapshot is overwritten wholesale on every successful non-empty
//! roster fetch — never partially merged — so its contents are always a
//! self-consistent view the booth can fall back to when the server becomes
//! unreachable. Restoration is a caller decision; this store only
//! guarantees the last good state is not lost.

use std::path::PathBuf;

use encore_core::DancerSummary;

use crate::error::{StoreError, StoreResult};
use crate::paths::write_atomic;

/// File-backed roster snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        SnapshotStore { path }
    }

    /// Overwrites the snapshot with a fresh projection.
    pub fn save(&self, roster: &[DancerSummary]) -> StoreResult<()> {
        let contents =
            serde_json::to_string(roster).map_err(|e| StoreError::corrupt(&self.path, e))?;
        write_atomic(&self.path, &contents)
    }

    /// Returns the last saved roster, or `None` when no snapshot exists yet.
    pub fn load(&self) -> StoreResult<Option<Vec<DancerSummary>>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::read(&self.path, e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::corrupt(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, active: bool) -> DancerSummary {
        DancerSummary {
            name: name.into(),
            tagline: String::new(),
            active,
        }
    }

    #[test]
    fn test_load_before_first_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("roster.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("roster.json"));

        store
            .save(&[summary("Nova", true), summary("Vesper", false)])
            .unwrap();
        store.save(&[summary("Lux", true)]).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Lux");
    }
}
