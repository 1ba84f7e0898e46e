//! # encore-sync: Resilient Sync & Telemetry Engine for Encore
//!
//! This crate provides the failure-mode-engineered layer of the Encore
//! booth client: server-pushed events under an unreliable network,
//! at-least-once command delivery, and credential-gated telemetry flushing.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Engine Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncAgent (Main Orchestrator)               │  │
//! │  │                                                                  │  │
//! │  │  Constructed once per process, passed by handle                  │  │
//! │  │  Wires components to the shared session + API client             │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  EventStream   │  │ CredentialGate │  │  CommandCursor         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ SSE subscription  │ WAITING→ACTIVE │  │ fetch-since /          │    │
//! │  │ fixed-delay    │  │ owns Flusher + │  │ ack-up-to with a       │    │
//! │  │ reconnect      │  │ Heartbeat      │  │ monotonic cursor       │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │                  ┌───────────┴───────────┐                             │
//! │                  ▼                       ▼                              │
//! │         ┌────────────────┐      ┌────────────────┐                     │
//! │         │TelemetryFlusher│      │HeartbeatReporter                     │
//! │         │                │      │                │                     │
//! │         │ drain buffer → │      │ sysinfo + app  │                     │
//! │         │ POST, requeue  │      │ probe + /health│                     │
//! │         │ on failure     │      │ → POST         │                     │
//! │         └───────┬────────┘      └────────────────┘                     │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │         ┌────────────────┐                                              │
//! │         │TelemetryBuffer │  bounded (200), persisted after every       │
//! │         │                │  mutation, infallible sync record()         │
//! │         └────────────────┘                                              │
//! │                                                                         │
//! │  FAILURE POLICY                                                        │
//! │  ──────────────                                                        │
//! │  • 401 anywhere     → session cleared once, "expired" surfaced         │
//! │  • flush failure    → whole batch requeued, retried next period        │
//! │  • stream drop      → reconnect after a fixed 3000 ms, forever         │
//! │  • buffer overflow  → oldest entries trimmed (lossy degradation)       │
//! │  • internal errors  → logged, never crash the hosting process          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - Main `SyncAgent` orchestrator
//! - [`api`] - HTTP client for the booth server and fleet collector
//! - [`buffer`] - Bounded, persisted telemetry buffer
//! - [`config`] - Engine configuration (TOML + env + defaults)
//! - [`cursor`] - Monotonic command cursor
//! - [`error`] - Sync error taxonomy
//! - [`events`] - SSE event stream with reconnect state machine
//! - [`flusher`] - Periodic telemetry flusher
//! - [`gate`] - Credential gate for collector traffic
//! - [`heartbeat`] - Heartbeat reporter and host metrics
//! - [`roster`] - Roster reads with backup snapshot
//! - [`session`] - Session store with clear-on-unauthorized semantics
//!
//! ## Usage
//!
//! ```rust,ignore
//! use encore_store::Store;
//! use encore_sync::{SyncAgent, SyncConfig};
//!
//! let store = Store::open_default()?;
//! let agent = SyncAgent::new(SyncConfig::load_or_default(None), store)?;
//!
//! agent.start().await;
//! agent.login(Role::Dj, "4217").await?;
//!
//! let mut events = agent.open_events().await?;
//! while let Some(notice) = events.recv().await {
//!     // apply commands, rebind on StreamNotice::Reconnected
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod api;
pub mod buffer;
pub mod config;
pub mod cursor;
pub mod error;
pub mod events;
pub mod flusher;
pub mod gate;
pub mod heartbeat;
pub mod roster;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentStatus, SyncAgent};
pub use api::{
    ApiClient, Collector, CommandFeed, HealthSource, RosterSource, ServerHealth,
    DEVICE_KEY_HEADER,
};
pub use buffer::TelemetryBuffer;
pub use config::SyncConfig;
pub use cursor::CommandCursor;
pub use error::{SyncError, SyncResult};
pub use events::{EventStream, EventStreamHandle, StreamConfig, StreamNotice, StreamState};
pub use flusher::TelemetryFlusher;
pub use gate::{CredentialGate, GateState};
pub use heartbeat::{ActivityProbe, HeartbeatReporter, HostMetrics, IdleProbe};
pub use roster::RosterService;
pub use session::SessionStore;
