//! # Collector Credentials
//!
//! Durable storage for the fleet collector endpoint and device key.
//!
//! ## Gating Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Credential Lifecycle                               │
//! │                                                                         │
//! │  Fresh install         credentials.toml absent                         │
//! │       │                → gate stays WAITING, zero collector traffic    │
//! │       ▼                                                                 │
//! │  Provisioning          endpoint and key written (possibly separately)  │
//! │       │                → load_ready() is None until BOTH are present   │
//! │       ▼                                                                 │
//! │  Provisioned           load_ready() returns the pair                   │
//! │                        → gate activates, flusher/heartbeat start       │
//! │                                                                         │
//! │  Credentials survive process restarts; only explicit deprovisioning    │
//! │  removes them.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::paths::write_atomic;

/// A complete collector credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCredentials {
    /// Base URL of the fleet collector.
    pub collector_url: String,

    /// Device key sent as `X-Device-Key` on collector requests.
    pub device_key: String,
}

/// On-disk shape; either half may be provisioned before the other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    collector_url: Option<String>,

    #[serde(default)]
    device_key: Option<String>,
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        CredentialStore { path }
    }

    /// Returns the credential pair only when both halves are present and
    /// non-empty.
    pub fn load_ready(&self) -> StoreResult<Option<DeviceCredentials>> {
        let file = self.read_file()?;

        match (file.collector_url, file.device_key) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Ok(Some(DeviceCredentials {
                    collector_url: url.trim().to_string(),
                    device_key: key.trim().to_string(),
                }))
            }
            _ => Ok(None),
        }
    }

    /// Stores the collector endpoint, preserving any existing key.
    pub fn set_collector_url(&self, url: &str) -> StoreResult<()> {
        let mut file = self.read_file()?;
        file.collector_url = Some(url.to_string());
        self.write_file(&file)
    }

    /// Stores the device key, preserving any existing endpoint.
    pub fn set_device_key(&self, key: &str) -> StoreResult<()> {
        let mut file = self.read_file()?;
        file.device_key = Some(key.to_string());
        self.write_file(&file)
    }

    /// Stores a complete pair in one write.
    pub fn save(&self, creds: &DeviceCredentials) -> StoreResult<()> {
        self.write_file(&CredentialFile {
            collector_url: Some(creds.collector_url.clone()),
            device_key: Some(creds.device_key.clone()),
        })
    }

    /// Removes both halves.
    pub fn clear(&self) -> StoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::write(&self.path, e)),
        }
    }

    fn read_file(&self) -> StoreResult<CredentialFile> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CredentialFile::default())
            }
            Err(e) => return Err(StoreError::read(&self.path, e)),
        };

        toml::from_str(&contents).map_err(|e| StoreError::corrupt(&self.path, e))
    }

    fn write_file(&self, file: &CredentialFile) -> StoreResult<()> {
        let contents = toml::to_string_pretty(file)
            .map_err(|e| StoreError::corrupt(&self.path, e))?;
        write_atomic(&self.path, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.toml"));
        (dir, store)
    }

    #[test]
    fn test_absent_file_is_not_ready() {
        let (_dir, store) = store();
        assert!(store.load_ready().unwrap().is_none());
    }

    #[test]
    fn test_half_provisioned_is_not_ready() {
        let (_dir, store) = store();

        store.set_collector_url("https://fleet.example.com").unwrap();
        assert!(store.load_ready().unwrap().is_none());

        store.set_device_key("key-123").unwrap();
        let creds = store.load_ready().unwrap().unwrap();
        assert_eq!(creds.collector_url, "https://fleet.example.com");
        assert_eq!(creds.device_key, "key-123");
    }

    #[test]
    fn test_empty_values_are_not_ready() {
        let (_dir, store) = store();
        store.set_collector_url("  ").unwrap();
        store.set_device_key("key-123").unwrap();
        assert!(store.load_ready().unwrap().is_none());
    }

    #[test]
    fn test_clear_removes_pair() {
        let (_dir, store) = store();
        store
            .save(&DeviceCredentials {
                collector_url: "https://fleet.example.com".into(),
                device_key: "key-123".into(),
            })
            .unwrap();
        assert!(store.load_ready().unwrap().is_some());

        store.clear().unwrap();
        assert!(store.load_ready().unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }
}
