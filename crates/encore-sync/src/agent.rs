//! # Sync Agent
//!
//! Main orchestrator for the sync engine. Owns the session, the credential
//! gate, the command cursor, the roster service, and the event stream.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncAgent                                │  │
//! │  │                                                                  │  │
//! │  │  • Constructed once per process, passed by handle                │  │
//! │  │  • Wires every component to the shared session + API client      │  │
//! │  │  • Tears the stream down on session invalidation                 │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  EventStream   │  │ CredentialGate │  │   CommandCursor        │    │
//! │  │  (SSE + fixed  │  │ (flusher +     │  │   (fetch/ack against   │    │
//! │  │  delay retry)  │  │  heartbeat)    │  │    the command queue)  │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  SESSION EXPIRY PATH                                                   │
//! │  ───────────────────                                                   │
//! │  any 401 ──► SessionStore.clear() ──► broadcast ──► stream closed      │
//! │  (the gate keeps running: collector auth is the device key, not the   │
//! │   session)                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::info;

use encore_core::{Role, Session};
use encore_store::Store;

use crate::api::ApiClient;
use crate::buffer::TelemetryBuffer;
use crate::config::SyncConfig;
use crate::cursor::CommandCursor;
use crate::error::SyncResult;
use crate::events::{EventStream, EventStreamHandle, StreamConfig, StreamNotice, StreamState};
use crate::gate::{CredentialGate, GateState};
use crate::heartbeat::{ActivityProbe, HostMetrics, IdleProbe};
use crate::roster::RosterService;
use crate::session::SessionStore;

// =============================================================================
// Agent Status
// =============================================================================

/// Point-in-time engine status for the host application.
#[derive(Debug, Clone)]
pub struct AgentStatus {
    /// Whether a session is present.
    pub session_present: bool,

    /// Role of the current session, if any.
    pub role: Option<Role>,

    /// Credential gate state.
    pub gate: GateState,

    /// Event stream state ([`StreamState::Disconnected`] when no stream is
    /// open).
    pub stream: StreamState,

    /// Unflushed telemetry entries.
    pub buffered_telemetry: usize,

    /// Highest fully-applied command id.
    pub acknowledged_command: i64,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Orchestrates the sync engine components.
pub struct SyncAgent {
    config: Arc<SyncConfig>,
    session: SessionStore,
    api: Arc<ApiClient>,
    buffer: Arc<TelemetryBuffer>,
    gate: Arc<CredentialGate>,
    cursor: Arc<CommandCursor>,
    roster: Arc<RosterService>,
    stream: RwLock<Option<EventStreamHandle>>,
}

impl SyncAgent {
    /// Creates an agent with the default (idle) activity probe.
    pub fn new(config: SyncConfig, store: Store) -> SyncResult<Self> {
        Self::with_probe(config, store, Arc::new(IdleProbe))
    }

    /// Creates an agent with a host-supplied activity probe.
    pub fn with_probe(
        config: SyncConfig,
        store: Store,
        probe: Arc<dyn ActivityProbe>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let session = SessionStore::new();
        let api = Arc::new(ApiClient::new(&config, session.clone())?);
        let buffer = Arc::new(TelemetryBuffer::new(
            store.journal().clone(),
            config.telemetry.capacity,
            config.device.app_version.clone(),
        ));

        let gate = Arc::new(CredentialGate::new(
            &config,
            store.credentials().clone(),
            buffer.clone(),
            api.clone(),
            api.clone(),
            probe,
            Arc::new(HostMetrics::new()),
        ));

        let cursor = Arc::new(CommandCursor::new(api.clone(), 0));
        let roster = Arc::new(RosterService::new(api.clone(), store.snapshot().clone()));

        Ok(SyncAgent {
            config: Arc::new(config),
            session,
            api,
            buffer,
            gate,
            cursor,
            roster,
            stream: RwLock::new(None),
        })
    }

    // =========================================================================
    // Component Handles
    // =========================================================================

    /// The session store.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// The telemetry buffer (the engine's logging interface for
    /// instrumented call sites and fault handlers).
    pub fn telemetry(&self) -> &Arc<TelemetryBuffer> {
        &self.buffer
    }

    /// The command cursor.
    pub fn commands(&self) -> &Arc<CommandCursor> {
        &self.cursor
    }

    /// The roster service.
    pub fn roster(&self) -> &Arc<RosterService> {
        &self.roster
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the credential gate (and with it, once provisioned, the
    /// telemetry flusher and heartbeat reporter).
    pub async fn start(&self) {
        info!(device = %self.config.device.name, "Sync agent starting");
        self.gate.start().await;
    }

    /// Logs in and stores the session.
    pub async fn login(&self, role: Role, pin: &str) -> SyncResult<Session> {
        self.api.login(role, pin).await
    }

    /// Re-validates a stored token with the server.
    pub async fn resume(&self) -> SyncResult<Session> {
        self.api.check_session().await
    }

    /// Discards the session locally.
    pub async fn logout(&self) {
        self.session.clear().await;
    }

    /// Re-reads the collector credential store (call after provisioning).
    pub async fn refresh_credentials(&self) -> bool {
        self.gate.poll_once().await
    }

    /// Stops the stream and every gate timer.
    pub async fn shutdown(&self) {
        self.close_events().await;
        self.gate.shutdown().await;
        info!("Sync agent stopped");
    }

    // =========================================================================
    // Event Stream
    // =========================================================================

    /// Opens the server-push stream, replacing any previous subscription.
    ///
    /// Fails with [`SyncError::NotStarted`] when no session exists. The
    /// stream is closed automatically if the session is invalidated.
    pub async fn open_events(&self) -> SyncResult<mpsc::Receiver<StreamNotice>> {
        let token = self.session.token().await;

        let stream_config = StreamConfig {
            endpoint: self.api.events_endpoint()?,
            reconnect_delay: self.config.reconnect_delay(),
            connect_timeout: self.config.request_timeout(),
        };

        let (handle, notices) = EventStream::spawn(stream_config, token, self.session.clone())?;

        // Session expiry anywhere in the engine tears the stream down.
        let mut invalidated = self.session.subscribe();
        let watcher = handle.clone();
        tokio::spawn(async move {
            if invalidated.recv().await.is_ok() {
                watcher.close().await;
            }
        });

        let previous = self.stream.write().await.replace(handle);
        if let Some(previous) = previous {
            previous.close().await;
        }

        Ok(notices)
    }

    /// Closes the stream, suppressing any pending reconnect.
    pub async fn close_events(&self) {
        if let Some(handle) = self.stream.write().await.take() {
            handle.close().await;
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Snapshot of the engine state.
    pub async fn status(&self) -> AgentStatus {
        let stream = match self.stream.read().await.as_ref() {
            Some(handle) => handle.state().await,
            None => StreamState::Disconnected,
        };

        AgentStatus {
            session_present: self.session.is_present().await,
            role: self.session.role().await,
            gate: self.gate.state().await,
            stream,
            buffered_telemetry: self.buffer.len(),
            acknowledged_command: self.cursor.acknowledged().await,
        }
    }
}
