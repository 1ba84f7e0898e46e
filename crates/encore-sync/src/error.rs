//! # Sync Error Types
//!
//! Error taxonomy for the sync engine.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │      Auth       │  │    Network      │  │      Protocol           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Unauthorized   │  │  Network        │  │  Protocol               │ │
//! │  │  LoginRejected  │  │  Timeout        │  │  Status                 │ │
//! │  │  NotStarted     │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Configuration  │  │    Internal     │                              │
//! │  │                 │  │                 │                              │
//! │  │  InvalidConfig  │  │  Store          │                              │
//! │  │  InvalidUrl     │  │  Channel        │                              │
//! │  │  ConfigLoad/Save│  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  Retry policy per category:                                            │
//! │  • Auth      → clear session, retry only after re-login                │
//! │  • Network   → retried by the owner's normal schedule, never inline    │
//! │  • Protocol  → logged, no-op for that cycle                            │
//! │  • Config    → surfaced to the caller, nothing to retry                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all network-facing failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Auth Errors
    // =========================================================================
    /// The server rejected the bearer token (401).
    ///
    /// The session has already been cleared by the time this surfaces; the
    /// request must not be retried with the stale token.
    #[error("Session expired")]
    Unauthorized,

    /// Login attempt rejected (wrong role/PIN).
    #[error("Login rejected: {0}")]
    LoginRejected(String),

    /// No session token available for an operation that requires one.
    #[error("Not started: no session token available")]
    NotStarted,

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// Connection-level failure (refused, DNS, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Response body did not match the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unexpected HTTP status.
    #[error("Unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Durable state failure.
    #[error("Storage error: {0}")]
    Store(#[from] encore_store::StoreError),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    Channel(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration on the error.
            SyncError::Timeout(0)
        } else if err.is_decode() {
            SyncError::Protocol(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the owning component may retry on its normal schedule.
    ///
    /// ## Retryable Errors
    /// - Connection failures (network issues)
    /// - Timeouts
    /// - Server-side 5xx statuses
    ///
    /// ## Non-Retryable Errors
    /// - Auth failures (need a fresh login first)
    /// - Configuration errors
    /// - Protocol mismatches
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Timeout(_) => true,
            SyncError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error invalidated the session.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Unauthorized)
    }

    /// Returns true if this error indicates a malformed exchange.
    pub fn is_protocol(&self) -> bool {
        matches!(self, SyncError::Protocol(_) | SyncError::Status { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
