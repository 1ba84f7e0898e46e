//! # Domain Types
//!
//! Core domain types used throughout Encore.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ TelemetryEntry  │   │ CommandEnvelope │   │ HeartbeatSample │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  timestamp (ms) │   │  id (server i64)│   │  memory/disk    │       │
//! │  │  level          │   │  action         │   │  uptime         │       │
//! │  │  component      │   │  payload (JSON) │   │  server fields? │       │
//! │  │  message/stack  │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Session      │   │     Role        │   │ DancerSummary   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  token (opaque) │   │  Dj             │   │  name           │       │
//! │  │  role           │   │  Dancer         │   │  tagline        │       │
//! │  │  subject id/name│   └─────────────────┘   │  active         │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All wire-facing structs serialize as camelCase to match the booth API.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::validation::{clamp_len, normalize_component};
use crate::{MAX_MESSAGE_LEN, MAX_STACK_LEN};

// =============================================================================
// Session Identity
// =============================================================================

/// Role attached to a booth session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The DJ console — full command surface.
    Dj,
    /// A dancer device — restricted, self-scoped surface.
    Dancer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Dj => write!(f, "dj"),
            Role::Dancer => write!(f, "dancer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dj" => Ok(Role::Dj),
            "dancer" => Ok(Role::Dancer),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}

/// An authenticated booth session.
///
/// Token presence implies a role by construction: there is no way to hold a
/// token without the rest of the identity, and the session store replaces or
/// clears the whole value atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer token, issued and validated server-side.
    pub token: String,

    /// Role granted by the server for this token.
    pub role: Role,

    /// Dancer id when the session belongs to a dancer device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    /// Dancer display name when the session belongs to a dancer device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,

    /// True when the session was established from outside the venue LAN.
    #[serde(default)]
    pub remote: bool,
}

// =============================================================================
// Telemetry
// =============================================================================

/// Severity of a telemetry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// A single client-observed telemetry entry.
///
/// Entries are immutable once created: the constructor stamps the timestamp
/// and clamps oversized fields, and nothing mutates them afterwards. They
/// live in the telemetry buffer until flushed to the collector or trimmed by
/// the capacity policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEntry {
    /// Creation time, epoch milliseconds (UTC).
    pub timestamp: i64,

    /// Severity level.
    pub level: LogLevel,

    /// Component tag identifying the instrumented call site.
    pub component: String,

    /// Human-readable message, clamped to [`MAX_MESSAGE_LEN`](crate::MAX_MESSAGE_LEN) bytes.
    pub message: String,

    /// Stack trace or error chain, clamped to [`MAX_STACK_LEN`](crate::MAX_STACK_LEN) bytes.
    #[serde(default)]
    pub stack: String,

    /// Application version that produced the entry.
    pub app_version: String,
}

impl TelemetryEntry {
    /// Creates an entry stamped with the current time.
    pub fn record(
        level: LogLevel,
        component: &str,
        message: &str,
        stack: Option<&str>,
        app_version: &str,
    ) -> Self {
        Self::with_timestamp(
            Utc::now().timestamp_millis(),
            level,
            component,
            message,
            stack,
            app_version,
        )
    }

    /// Creates an entry with an explicit timestamp.
    pub fn with_timestamp(
        timestamp: i64,
        level: LogLevel,
        component: &str,
        message: &str,
        stack: Option<&str>,
        app_version: &str,
    ) -> Self {
        TelemetryEntry {
            timestamp,
            level,
            component: normalize_component(component),
            message: clamp_len(message, MAX_MESSAGE_LEN),
            stack: clamp_len(stack.unwrap_or_default(), MAX_STACK_LEN),
            app_version: app_version.to_string(),
        }
    }
}

// =============================================================================
// Heartbeat
// =============================================================================

/// Health snapshot sent to the fleet collector each reporting cycle.
///
/// Ephemeral: constructed fresh every cycle, never persisted. The
/// `server_*` fields come from a best-effort fetch of the local server's
/// health endpoint and are omitted from the wire payload when that fetch
/// fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatSample {
    pub app_version: String,
    pub memory_percent: f64,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub disk_percent: f64,
    pub disk_used_mb: u64,
    pub uptime_seconds: u64,

    /// Work units currently queued or live in the booth (announcements,
    /// pending commands) as counted by the host application.
    pub active_work_units: u32,

    /// True while a performance is live.
    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_memory_rss_mb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_heap_used_mb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_uptime_seconds: Option<u64>,
}

// =============================================================================
// Commands
// =============================================================================

/// A server-issued booth command.
///
/// The id is assigned by the server and increases monotonically; the client
/// never mutates an envelope. It reads batches "since cursor C" and later
/// commits "ack through id M" where M ≥ every id it processed in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Server-assigned, monotonically increasing identifier.
    pub id: i64,

    /// Command verb, e.g. "announce", "setStage", "mute".
    pub action: String,

    /// Structured command arguments.
    #[serde(default)]
    pub payload: serde_json::Value,
}

// =============================================================================
// Roster Projection
// =============================================================================

/// Full dancer record as returned by the booth API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dancer {
    pub id: String,
    pub name: String,
    /// Short display line shown on the booth roster.
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub active: bool,
}

/// Minimal dancer projection mirrored into the backup snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DancerSummary {
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub active: bool,
}

impl From<&Dancer> for DancerSummary {
    fn from(d: &Dancer) -> Self {
        DancerSummary {
            name: d.name.clone(),
            tagline: d.tagline.clone(),
            active: d.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("dj".parse::<Role>().unwrap(), Role::Dj);
        assert_eq!("DANCER".parse::<Role>().unwrap(), Role::Dancer);
        assert!("vj".parse::<Role>().is_err());
    }

    #[test]
    fn test_telemetry_entry_clamps_fields() {
        let long_message = "m".repeat(MAX_MESSAGE_LEN + 50);
        let long_stack = "s".repeat(MAX_STACK_LEN + 50);
        let entry = TelemetryEntry::record(
            LogLevel::Error,
            "events",
            &long_message,
            Some(&long_stack),
            "1.4.2",
        );

        assert_eq!(entry.message.len(), MAX_MESSAGE_LEN);
        assert_eq!(entry.stack.len(), MAX_STACK_LEN);
        assert_eq!(entry.component, "events");
    }

    #[test]
    fn test_telemetry_entry_wire_shape() {
        let entry = TelemetryEntry::with_timestamp(
            1_700_000_000_000,
            LogLevel::Warn,
            "flusher",
            "collector rejected batch",
            None,
            "1.4.2",
        );
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["level"], "warn");
        assert_eq!(json["appVersion"], "1.4.2");
        assert_eq!(json["stack"], "");
    }

    #[test]
    fn test_heartbeat_omits_absent_server_fields() {
        let sample = HeartbeatSample {
            app_version: "1.4.2".into(),
            memory_percent: 41.5,
            memory_used_mb: 3320,
            memory_total_mb: 8000,
            disk_percent: 72.0,
            disk_used_mb: 36_000,
            uptime_seconds: 600,
            active_work_units: 2,
            is_active: true,
            server_memory_rss_mb: None,
            server_heap_used_mb: None,
            server_uptime_seconds: None,
        };
        let json = serde_json::to_value(&sample).unwrap();

        assert!(json.get("serverMemoryRssMb").is_none());
        assert_eq!(json["activeWorkUnits"], 2);
        assert_eq!(json["isActive"], true);
    }

    #[test]
    fn test_command_envelope_decoding() {
        let raw = r#"{"id": 41, "action": "announce", "payload": {"text": "next set"}}"#;
        let cmd: CommandEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(cmd.id, 41);
        assert_eq!(cmd.action, "announce");
        assert_eq!(cmd.payload["text"], "next set");
    }

    #[test]
    fn test_session_round_trip() {
        let session = Session {
            token: "tok-123".into(),
            role: Role::Dancer,
            subject_id: Some("d-7".into()),
            subject_name: Some("Nova".into()),
            remote: false,
        };
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
