//! # encore-store: Durable Local State for Encore
//!
//! This crate owns the booth machine's durable state: the unflushed
//! telemetry journal, the fleet collector credentials, and the roster
//! backup snapshot.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Encore Data Flow                                 │
//! │                                                                         │
//! │  encore-sync (TelemetryBuffer, CredentialGate, RosterService)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    encore-store (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │ TelemetryJournal  │ CredentialStore │   │ SnapshotStore │  │   │
//! │  │   │ (journal.rs)  │   │(credentials.rs)│   │ (snapshot.rs) │  │   │
//! │  │   │               │   │                │   │               │  │   │
//! │  │   │ telemetry.json│   │credentials.toml│   │ roster.json   │  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     State Directory                             │   │
//! │  │   ~/.local/share/encore (Linux)                                 │   │
//! │  │   ~/Library/Application Support/com.encore.encore (macOS)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`paths`] - State directory resolution
//! - [`journal`] - Persisted telemetry journal
//! - [`credentials`] - Durable collector credentials
//! - [`snapshot`] - Roster backup snapshot
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use encore_store::Store;
//!
//! let store = Store::open_default()?;
//!
//! // Persist the telemetry journal
//! store.journal().save(&entries)?;
//!
//! // Check for collector credentials
//! if let Some(creds) = store.credentials().load_ready()? {
//!     println!("collector: {}", creds.collector_url);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credentials;
pub mod error;
pub mod journal;
pub mod paths;
pub mod snapshot;

// =============================================================================
// Re-exports
// =============================================================================

pub use credentials::{CredentialStore, DeviceCredentials};
pub use error::{StoreError, StoreResult};
pub use journal::TelemetryJournal;
pub use paths::StatePaths;
pub use snapshot::SnapshotStore;

use std::path::Path;

/// Facade over the booth machine's durable state.
///
/// Constructed once per process and shared by handle; each accessor returns
/// a cheap clone of the underlying file-backed store.
#[derive(Debug, Clone)]
pub struct Store {
    journal: TelemetryJournal,
    credentials: CredentialStore,
    snapshot: SnapshotStore,
}

impl Store {
    /// Opens the store under the platform state directory.
    pub fn open_default() -> StoreResult<Self> {
        Self::open(StatePaths::resolve()?)
    }

    /// Opens the store under an explicit root (used by tests).
    pub fn open_at(root: &Path) -> StoreResult<Self> {
        Self::open(StatePaths::at(root))
    }

    fn open(paths: StatePaths) -> StoreResult<Self> {
        paths.ensure()?;
        Ok(Store {
            journal: TelemetryJournal::new(paths.telemetry_file()),
            credentials: CredentialStore::new(paths.credentials_file()),
            snapshot: SnapshotStore::new(paths.roster_file()),
        })
    }

    /// The persisted telemetry journal.
    pub fn journal(&self) -> &TelemetryJournal {
        &self.journal
    }

    /// Durable collector credentials.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Roster backup snapshot.
    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_at_creates_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("state");
        let store = Store::open_at(&root).unwrap();

        assert!(root.is_dir());
        assert!(store.journal().load().unwrap().is_empty());
        assert!(store.credentials().load_ready().unwrap().is_none());
        assert!(store.snapshot().load().unwrap().is_none());
    }
}
