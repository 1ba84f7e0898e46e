//! # Telemetry Journal
//!
//! Durable file behind the in-memory telemetry buffer.
//!
//! ## Why Persist After Every Mutation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Crash-Survival Requirement                           │
//! │                                                                         │
//! │  record("error", ...)  ← often called FROM a fault handler             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  buffer mutation (append + trim to capacity)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  journal.save(...)  ← the process may die on the very next line        │
//! │                                                                         │
//! │  Telemetry about a crash must survive the crash. On the next start     │
//! │  the buffer is seeded from journal.load() and the entries flush as     │
//! │  soon as the credential gate opens.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A corrupt or unreadable journal yields an empty list rather than an
//! error: losing stale telemetry is acceptable, refusing to start is not.

use std::path::PathBuf;

use encore_core::TelemetryEntry;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::paths::write_atomic;

/// File-backed journal of unflushed telemetry entries.
#[derive(Debug, Clone)]
pub struct TelemetryJournal {
    path: PathBuf,
}

impl TelemetryJournal {
    pub fn new(path: PathBuf) -> Self {
        TelemetryJournal { path }
    }

    /// Loads the journal, returning an empty list when the file is missing
    /// or unreadable.
    pub fn load(&self) -> StoreResult<Vec<TelemetryEntry>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::read(&self.path, e)),
        };

        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // Stale telemetry is expendable; a corrupt journal must not
                // keep the buffer from starting.
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt telemetry journal");
                Ok(Vec::new())
            }
        }
    }

    /// Persists the full journal contents atomically.
    pub fn save(&self, entries: &[TelemetryEntry]) -> StoreResult<()> {
        let contents = serde_json::to_string(entries)
            .map_err(|e| StoreError::corrupt(&self.path, e))?;
        write_atomic(&self.path, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::LogLevel;

    fn entry(message: &str) -> TelemetryEntry {
        TelemetryEntry::with_timestamp(1_700_000_000_000, LogLevel::Error, "test", message, None, "1.0.0")
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TelemetryJournal::new(dir.path().join("telemetry.json"));
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TelemetryJournal::new(dir.path().join("telemetry.json"));

        let entries = vec![entry("first"), entry("second")];
        journal.save(&entries).unwrap();

        assert_eq!(journal.load().unwrap(), entries);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.json");
        std::fs::write(&path, "{not json").unwrap();

        let journal = TelemetryJournal::new(path);
        assert!(journal.load().unwrap().is_empty());
    }
}
