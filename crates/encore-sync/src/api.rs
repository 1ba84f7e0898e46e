//! # Booth API Client
//!
//! Typed HTTP client for the booth server and the fleet collector.
//!
//! ## Endpoint Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HTTP Surface                                     │
//! │                                                                         │
//! │  BOOTH SERVER (Authorization: Bearer <token>)                          │
//! │  ─────────────────────────────────────────────                         │
//! │  POST /auth/login            {role, pin} → session fields              │
//! │  GET  /auth/session          re-validate an existing token             │
//! │  GET  /booth/commands?since= command batch past the cursor             │
//! │  POST /booth/commands/ack    {upToId} commit the cursor                │
//! │  GET  /booth/dancers         full roster (snapshot source)             │
//! │  GET  /booth/events?token=   SSE stream (token as query: the stream    │
//! │                              transport cannot carry custom headers)    │
//! │                                                                         │
//! │  FLEET COLLECTOR (X-Device-Key: <device key>)                          │
//! │  ────────────────────────────────────────────                          │
//! │  POST {collector}/fleet/logs       {logs: [...]}                       │
//! │  POST {collector}/fleet/heartbeat  heartbeat sample                    │
//! │                                                                         │
//! │  LOCAL (no auth, best-effort)                                          │
//! │  ────────────────────────────                                          │
//! │  GET  /health                {memory: {rss, heapUsed}, uptime}         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The 401 Contract
//! Every bearer-authenticated response passes through [`ApiClient::guard`]:
//! a 401 clears the session store (which broadcasts session-invalidated to
//! all subscribers) and surfaces [`SyncError::Unauthorized`]. The request is
//! never retried with the stale token. Collector endpoints authenticate
//! with the device key, not the session, so their failures never touch the
//! session store.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use encore_core::{
    validation::validate_pin, CommandEnvelope, Dancer, HeartbeatSample, Role, Session,
    TelemetryEntry,
};
use encore_store::DeviceCredentials;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::session::SessionStore;

/// Header carrying the device key on collector requests.
pub const DEVICE_KEY_HEADER: &str = "X-Device-Key";

// =============================================================================
// Wire Shapes
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    role: Role,
    pin: &'a str,
}

/// Session fields as returned by `/auth/login` and `/auth/session`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    role: Role,
    #[serde(default)]
    dancer_id: Option<String>,
    #[serde(default)]
    dancer_name: Option<String>,
    #[serde(default)]
    remote: bool,
}

impl From<SessionResponse> for Session {
    fn from(r: SessionResponse) -> Self {
        Session {
            token: r.token,
            role: r.role,
            subject_id: r.dancer_id,
            subject_name: r.dancer_name,
            remote: r.remote,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AckRequest {
    up_to_id: i64,
}

#[derive(Debug, Serialize)]
struct LogBatch<'a> {
    logs: &'a [TelemetryEntry],
}

/// Best-effort health snapshot of the booth server process.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerHealth {
    pub memory: HealthMemory,
    /// Server process uptime in seconds.
    pub uptime: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMemory {
    /// Resident set size, bytes.
    pub rss: f64,
    /// Heap in use, bytes.
    pub heap_used: f64,
}

// =============================================================================
// Component Seams
// =============================================================================

/// Remote collector sink for telemetry and heartbeats.
///
/// Implemented by [`ApiClient`]; tests substitute recording fakes.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn push_logs(
        &self,
        creds: &DeviceCredentials,
        entries: &[TelemetryEntry],
    ) -> SyncResult<()>;

    async fn push_heartbeat(
        &self,
        creds: &DeviceCredentials,
        sample: &HeartbeatSample,
    ) -> SyncResult<()>;
}

/// Best-effort source of the booth server's health snapshot.
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn fetch_health(&self) -> SyncResult<ServerHealth>;
}

/// Server-held command queue operations.
#[async_trait]
pub trait CommandFeed: Send + Sync {
    /// Fetches every command with id greater than `cursor`.
    async fn fetch_since(&self, cursor: i64) -> SyncResult<Vec<CommandEnvelope>>;

    /// Tells the server that all ids ≤ `up_to` are processed.
    async fn acknowledge(&self, up_to: i64) -> SyncResult<()>;
}

/// Source of the full dancer roster.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn list_dancers(&self) -> SyncResult<Vec<Dancer>>;
}

// =============================================================================
// API Client
// =============================================================================

/// HTTP client shared by every network-facing component.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl ApiClient {
    /// Creates a client for the configured booth server.
    pub fn new(config: &SyncConfig, session: SessionStore) -> SyncResult<Self> {
        // Fail fast on an unparseable base URL instead of on the first call.
        Url::parse(&config.server.base_url)?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(ApiClient {
            http,
            base_url: config.server.base_url.trim_end_matches('/').to_string(),
            session,
            request_timeout: config.request_timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    /// The session store this client reports 401s to.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// SSE subscription endpoint; the event stream appends the token as a
    /// query credential itself.
    pub fn events_endpoint(&self) -> SyncResult<Url> {
        Ok(Url::parse(&self.endpoint("/booth/events"))?)
    }

    async fn bearer(&self) -> SyncResult<String> {
        self.session.token().await.ok_or(SyncError::NotStarted)
    }

    /// Applies the 401 contract and status mapping to a bearer response.
    async fn guard(&self, endpoint: &str, resp: reqwest::Response) -> SyncResult<reqwest::Response> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.session.clear().await;
            return Err(SyncError::Unauthorized);
        }

        if !resp.status().is_success() {
            return Err(SyncError::Status {
                endpoint: endpoint.to_string(),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp)
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Logs in with a role and PIN; stores and returns the session.
    pub async fn login(&self, role: Role, pin: &str) -> SyncResult<Session> {
        validate_pin(pin).map_err(|e| SyncError::LoginRejected(e.to_string()))?;

        let resp = self
            .http
            .post(self.endpoint("/auth/login"))
            .timeout(self.request_timeout)
            .json(&LoginRequest { role, pin })
            .send()
            .await?;

        // Login carries no bearer token, so a 401 here means a bad PIN,
        // not an expired session.
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SyncError::LoginRejected(format!(
                "server returned {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(SyncError::Status {
                endpoint: "/auth/login".to_string(),
                status: status.as_u16(),
            });
        }

        let session: Session = resp.json::<SessionResponse>().await?.into();
        self.session.set(session.clone()).await;
        Ok(session)
    }

    /// Re-validates the stored token against the server.
    pub async fn check_session(&self) -> SyncResult<Session> {
        let token = self.bearer().await?;

        let resp = self
            .http
            .get(self.endpoint("/auth/session"))
            .timeout(self.request_timeout)
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = self.guard("/auth/session", resp).await?;

        let session: Session = resp.json::<SessionResponse>().await?.into();
        self.session.set(session.clone()).await;
        Ok(session)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Fetches the command batch past `since`.
    pub async fn fetch_commands(&self, since: i64) -> SyncResult<Vec<CommandEnvelope>> {
        let token = self.bearer().await?;

        let resp = self
            .http
            .get(self.endpoint("/booth/commands"))
            .timeout(self.request_timeout)
            .query(&[("since", since)])
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = self.guard("/booth/commands", resp).await?;

        Ok(resp.json().await?)
    }

    /// Commits the command cursor on the server.
    pub async fn ack_commands(&self, up_to: i64) -> SyncResult<()> {
        let token = self.bearer().await?;

        let resp = self
            .http
            .post(self.endpoint("/booth/commands/ack"))
            .timeout(self.request_timeout)
            .json(&AckRequest { up_to_id: up_to })
            .bearer_auth(&token)
            .send()
            .await?;
        self.guard("/booth/commands/ack", resp).await?;

        Ok(())
    }

    // =========================================================================
    // Roster
    // =========================================================================

    /// Fetches the full dancer roster.
    pub async fn fetch_dancers(&self) -> SyncResult<Vec<Dancer>> {
        let token = self.bearer().await?;

        let resp = self
            .http
            .get(self.endpoint("/booth/dancers"))
            .timeout(self.request_timeout)
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = self.guard("/booth/dancers", resp).await?;

        Ok(resp.json().await?)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

#[async_trait]
impl Collector for ApiClient {
    async fn push_logs(
        &self,
        creds: &DeviceCredentials,
        entries: &[TelemetryEntry],
    ) -> SyncResult<()> {
        let url = collector_endpoint(creds, "/fleet/logs");

        let resp = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .header(DEVICE_KEY_HEADER, &creds.device_key)
            .json(&LogBatch { logs: entries })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SyncError::Status {
                endpoint: "/fleet/logs".to_string(),
                status: resp.status().as_u16(),
            });
        }

        Ok(())
    }

    async fn push_heartbeat(
        &self,
        creds: &DeviceCredentials,
        sample: &HeartbeatSample,
    ) -> SyncResult<()> {
        let url = collector_endpoint(creds, "/fleet/heartbeat");

        let resp = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .header(DEVICE_KEY_HEADER, &creds.device_key)
            .json(sample)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SyncError::Status {
                endpoint: "/fleet/heartbeat".to_string(),
                status: resp.status().as_u16(),
            });
        }

        // The acknowledgement body, when present, carries nothing the
        // client acts on.
        Ok(())
    }
}

#[async_trait]
impl HealthSource for ApiClient {
    async fn fetch_health(&self) -> SyncResult<ServerHealth> {
        let resp = self
            .http
            .get(self.endpoint("/health"))
            .timeout(self.health_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SyncError::Status {
                endpoint: "/health".to_string(),
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl CommandFeed for ApiClient {
    async fn fetch_since(&self, cursor: i64) -> SyncResult<Vec<CommandEnvelope>> {
        self.fetch_commands(cursor).await
    }

    async fn acknowledge(&self, up_to: i64) -> SyncResult<()> {
        self.ack_commands(up_to).await
    }
}

#[async_trait]
impl RosterSource for ApiClient {
    async fn list_dancers(&self) -> SyncResult<Vec<Dancer>> {
        self.fetch_dancers().await
    }
}

fn collector_endpoint(creds: &DeviceCredentials, path: &str) -> String {
    format!("{}{}", creds.collector_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_endpoint_join() {
        let creds = DeviceCredentials {
            collector_url: "https://fleet.example.com/".into(),
            device_key: "key".into(),
        };
        assert_eq!(
            collector_endpoint(&creds, "/fleet/logs"),
            "https://fleet.example.com/fleet/logs"
        );
    }

    #[test]
    fn test_events_endpoint_path() {
        let config = SyncConfig::default();
        let client = ApiClient::new(&config, SessionStore::new()).unwrap();
        let url = client.events_endpoint().unwrap();

        assert!(url.path().ends_with("/booth/events"));
        assert!(url.query().is_none());
    }

    #[test]
    fn test_ack_request_wire_shape() {
        let json = serde_json::to_value(AckRequest { up_to_id: 17 }).unwrap();
        assert_eq!(json["upToId"], 17);
    }

    #[test]
    fn test_session_response_decodes_optional_fields() {
        let raw = r#"{"token": "t", "role": "dancer", "dancerId": "d-1", "dancerName": "Nova"}"#;
        let resp: SessionResponse = serde_json::from_str(raw).unwrap();
        let session: Session = resp.into();

        assert_eq!(session.role, Role::Dancer);
        assert_eq!(session.subject_id.as_deref(), Some("d-1"));
        assert!(!session.remote);

        let raw = r#"{"token": "t", "role": "dj"}"#;
        let resp: SessionResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.dancer_id.is_none());
    }
}
