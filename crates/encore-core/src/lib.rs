//! # encore-core: Pure Domain Types for Encore
//!
//! This crate holds the domain types shared by every layer of the Encore
//! booth client. It contains no I/O: types, field validation, and telemetry
//! entry construction only.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Encore Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Booth UI (out of tree)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    encore-sync (Sync Engine)                    │   │
//! │  │     SessionStore, EventStream, CommandCursor, Flusher, Gate     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ encore-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐                 │   │
//! │  │   │   types   │  │ validation │  │   error   │                 │   │
//! │  │   │ Telemetry │  │  clamping  │  │  CoreError│                 │   │
//! │  │   │ Commands  │  │  checks    │  │           │                 │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (TelemetryEntry, CommandEnvelope, Session, ...)
//! - [`validation`] - Field clamping and format checks
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum entries retained by the telemetry buffer.
///
/// Overflow drops the oldest entries, never the newest: under a sustained
/// collector outage the buffer degrades lossily instead of growing without
/// bound.
pub const TELEMETRY_CAPACITY: usize = 200;

/// Maximum length of a telemetry message, in bytes.
///
/// Longer messages are truncated at construction so a runaway error string
/// (e.g. a serialized response body) cannot bloat the persisted journal.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Maximum length of a telemetry stack trace, in bytes.
pub const MAX_STACK_LEN: usize = 4000;

/// Maximum length of a telemetry component tag, in bytes.
pub const MAX_COMPONENT_LEN: usize = 64;
