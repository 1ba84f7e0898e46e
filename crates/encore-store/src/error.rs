//! # Store Error Types
//!
//! Error types for durable state operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io::Error / serde_json::Error / toml errors                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds the file path and operation context   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (encore-sync) ← Swallowed or surfaced per component policy  │
//! │                                                                         │
//! │  The telemetry buffer swallows StoreError entirely: a failed journal   │
//! │  write must never turn `record` into a second fault.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable state errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No platform state directory could be resolved.
    #[error("No state directory available on this platform")]
    NoStateDir,

    /// Filesystem read failed.
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem write failed.
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted file exists but does not parse.
    #[error("Corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::ReadFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::WriteFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
