//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ENCORE_BASE_URL=https://booth.venue.lan                            │
//! │     ENCORE_DEVICE_NAME="Booth console"                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/encore/sync.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.encore.encore/sync.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost booth server, 3-minute collector periods                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [server]
//! base_url = "http://127.0.0.1:4600"
//!
//! [device]
//! name = "Booth console"
//! app_version = "1.4.2"
//!
//! [telemetry]
//! capacity = 200
//! flush_interval_secs = 180
//! credential_poll_secs = 30
//! request_timeout_secs = 10
//!
//! [heartbeat]
//! interval_secs = 180
//! health_timeout_secs = 3
//!
//! [stream]
//! reconnect_delay_ms = 3000
//! ```
//!
//! Note the collector endpoint and device key are NOT here: they are
//! provisioned at runtime and live in the durable credential store, because
//! their presence (not just their value) drives the credential gate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Server Settings
// =============================================================================

/// Booth server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL of the booth server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:4600".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            base_url: default_base_url(),
        }
    }
}

// =============================================================================
// Device Settings
// =============================================================================

/// Configuration for this booth device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Human-readable device name (e.g. "Booth console", "Stage left pad").
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Application version reported in telemetry and heartbeats.
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

fn default_device_name() -> String {
    "Booth console".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            name: default_device_name(),
            app_version: default_app_version(),
        }
    }
}

// =============================================================================
// Telemetry Settings
// =============================================================================

/// Telemetry buffer and flusher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Maximum buffered entries; overflow drops the oldest.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Interval between flush cycles (seconds).
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Interval between credential polls while the gate is waiting (seconds).
    #[serde(default = "default_credential_poll")]
    pub credential_poll_secs: u64,

    /// Timeout for collector and booth API requests (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_capacity() -> usize {
    encore_core::TELEMETRY_CAPACITY
}
fn default_flush_interval() -> u64 {
    180
}
fn default_credential_poll() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    10
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        TelemetrySettings {
            capacity: default_capacity(),
            flush_interval_secs: default_flush_interval(),
            credential_poll_secs: default_credential_poll(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Heartbeat Settings
// =============================================================================

/// Heartbeat reporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    /// Interval between heartbeat cycles (seconds).
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,

    /// Timeout for the best-effort local health fetch (seconds).
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    180
}
fn default_health_timeout() -> u64 {
    3
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        HeartbeatSettings {
            interval_secs: default_heartbeat_interval(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

// =============================================================================
// Stream Settings
// =============================================================================

/// Server-push stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Fixed delay before each reconnection attempt (milliseconds).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_reconnect_delay() -> u64 {
    3000
}

impl Default for StreamSettings {
    fn default() -> Self {
        StreamSettings {
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Booth server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Device settings.
    #[serde(default)]
    pub device: DeviceSettings,

    /// Telemetry buffer/flusher settings.
    #[serde(default)]
    pub telemetry: TelemetrySettings,

    /// Heartbeat reporter settings.
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,

    /// Server-push stream settings.
    #[serde(default)]
    pub stream: StreamSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = &self.server.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::InvalidUrl(format!(
                "Base URL must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.telemetry.capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "telemetry capacity must be greater than 0".into(),
            ));
        }

        if self.telemetry.flush_interval_secs == 0 || self.heartbeat.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "collector intervals must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ENCORE_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.server.base_url = url;
        }

        if let Ok(name) = std::env::var("ENCORE_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Ok(version) = std::env::var("ENCORE_APP_VERSION") {
            self.device.app_version = version;
        }

        if let Ok(secs) = std::env::var("ENCORE_FLUSH_INTERVAL_SECS") {
            if let Ok(v) = secs.parse() {
                self.telemetry.flush_interval_secs = v;
            }
        }

        if let Ok(secs) = std::env::var("ENCORE_HEARTBEAT_INTERVAL_SECS") {
            if let Ok(v) = secs.parse() {
                self.heartbeat.interval_secs = v;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "encore", "encore")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Timeout for collector and booth API requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.telemetry.request_timeout_secs)
    }

    /// Timeout for the best-effort health fetch.
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat.health_timeout_secs)
    }

    /// Interval between flush cycles.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry.flush_interval_secs)
    }

    /// Interval between heartbeat cycles.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat.interval_secs)
    }

    /// Interval between credential polls while waiting.
    pub fn credential_poll(&self) -> Duration {
        Duration::from_secs(self.telemetry.credential_poll_secs)
    }

    /// Fixed delay before stream reconnection attempts.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.stream.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.telemetry.capacity, 200);
        assert_eq!(config.telemetry.flush_interval_secs, 180);
        assert_eq!(config.telemetry.credential_poll_secs, 30);
        assert_eq!(config.heartbeat.interval_secs, 180);
        assert_eq!(config.stream.reconnect_delay_ms, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.server.base_url = "ws://wrong-scheme".to_string();
        assert!(config.validate().is_err());

        config.server.base_url = "https://booth.venue.lan".to_string();
        config.telemetry.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[telemetry]"));

        let back: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.server.base_url, config.server.base_url);
        assert_eq!(back.telemetry.capacity, config.telemetry.capacity);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [server]
            base_url = "https://booth.venue.lan"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "https://booth.venue.lan");
        assert_eq!(config.telemetry.capacity, 200);
        assert_eq!(config.stream.reconnect_delay_ms, 3000);
    }
}
