//! # Validation Module
//!
//! Field clamping and format checks for Encore.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Call site (instrumented code, fault handlers)                │
//! │  ├── Passes whatever it has - may be arbitrarily large                 │
//! │  └── MUST NOT be able to fail (record is infallible)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Clamps message/stack to wire limits (char-boundary safe)          │
//! │  └── Normalizes component tags                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Collector (server-side)                                      │
//! │  └── Rejects anything still out of contract                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Clamping instead of rejecting is deliberate: telemetry construction runs
//! inside fault-handling paths where raising a secondary error would be
//! catastrophic, so every function here totalizes its input.

use crate::error::ValidationError;
use crate::MAX_COMPONENT_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Clamping
// =============================================================================

/// Truncates a string to at most `max` bytes without splitting a character.
pub fn clamp_len(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Normalizes a component tag: trimmed, lowercased, clamped, never empty.
pub fn normalize_component(component: &str) -> String {
    let tag = component.trim().to_lowercase();
    if tag.is_empty() {
        return "unknown".to_string();
    }
    clamp_len(&tag, MAX_COMPONENT_LEN)
}

// =============================================================================
// Format Checks
// =============================================================================

/// Validates a login PIN.
///
/// ## Rules
/// - 4 to 8 characters
/// - Digits only
pub fn validate_pin(pin: &str) -> ValidationResult<()> {
    if pin.is_empty() {
        return Err(ValidationError::Required {
            field: "pin".to_string(),
        });
    }

    if pin.len() < 4 || pin.len() > 8 {
        return Err(ValidationError::InvalidFormat {
            field: "pin".to_string(),
            reason: "must be 4 to 8 digits".to_string(),
        });
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "pin".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a dancer display name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 80 characters
pub fn validate_dancer_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 80 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 80,
        });
    }

    Ok(())
}
