//! # State Directory Resolution
//!
//! Resolves where Encore keeps its durable files.
//!
//! ## Layout
//! ```text
//! <state dir>/
//! ├── telemetry.json     # unflushed telemetry entries
//! ├── credentials.toml   # collector endpoint + device key
//! └── roster.json        # last known-good dancer roster
//! ```
//!
//! The platform state directory comes from `directories::ProjectDirs`;
//! tests point [`StatePaths::at`] at a temp dir instead.

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Resolved locations of the durable state files.
#[derive(Debug, Clone)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// Resolves the platform state directory.
    pub fn resolve() -> StoreResult<Self> {
        directories::ProjectDirs::from("com", "encore", "encore")
            .map(|dirs| StatePaths {
                root: dirs.data_dir().to_path_buf(),
            })
            .ok_or(StoreError::NoStateDir)
    }

    /// Uses an explicit root directory.
    pub fn at(root: &Path) -> Self {
        StatePaths {
            root: root.to_path_buf(),
        }
    }

    /// Creates the state directory if missing.
    pub fn ensure(&self) -> StoreResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| StoreError::write(&self.root, e))
    }

    /// Root of the state directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Telemetry journal file.
    pub fn telemetry_file(&self) -> PathBuf {
        self.root.join("telemetry.json")
    }

    /// Collector credentials file.
    pub fn credentials_file(&self) -> PathBuf {
        self.root.join("credentials.toml")
    }

    /// Roster snapshot file.
    pub fn roster_file(&self) -> PathBuf {
        self.root.join("roster.json")
    }
}

// =============================================================================
// Atomic Write Helper
// =============================================================================

/// Writes `contents` to `path` via a sibling temp file and rename.
///
/// A crash mid-write leaves the previous file intact, never a torn one.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");

    std::fs::write(&tmp, contents).map_err(|e| StoreError::write(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::write(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = StatePaths::at(Path::new("/tmp/encore-state"));
        assert!(paths.telemetry_file().ends_with("telemetry.json"));
        assert!(paths.credentials_file().ends_with("credentials.toml"));
        assert!(paths.roster_file().ends_with("roster.json"));
    }

    #[test]
    fn test_write_atomic_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_extension("tmp").exists());
    }
}
