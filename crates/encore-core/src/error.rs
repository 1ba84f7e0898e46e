//! # Error Types
//!
//! Domain-specific error types for encore-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  encore-core errors (this file)                                        │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Field validation failures                      │
//! │                                                                         │
//! │  encore-store errors (separate crate)                                  │
//! │  └── StoreError       - Durable state failures                         │
//! │                                                                         │
//! │  encore-sync errors (separate crate)                                   │
//! │  └── SyncError        - Network, auth, protocol failures               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → host application      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (role string, field name, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown session role string.
    #[error("Unknown role: '{0}'. Valid options: dj, dancer")]
    InvalidRole(String),

    /// Unknown telemetry level string.
    #[error("Unknown log level: '{0}'. Valid options: info, warn, error")]
    InvalidLevel(String),

    /// Field validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A field exceeds its maximum length.
    #[error("{field} exceeds maximum length of {max}")]
    TooLong { field: String, max: usize },

    /// A field has an invalid format.
    #[error("{field} is invalid: {reason}")]
    InvalidFormat { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidRole("vj".into());
        assert!(err.to_string().contains("vj"));

        let err = ValidationError::TooLong {
            field: "name".into(),
            max: 80,
        };
        assert!(err.to_string().contains("80"));
    }
}
