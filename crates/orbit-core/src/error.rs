//! # Error Types
//!
//! Domain-specific error types for orbit-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  orbit-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Malformed input to a pure function             │
//! │  └── ErrorKind        - Stable classification for callers              │
//! │                                                                         │
//! │  orbit-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → HTTP layer (external)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, number, ID)
//! 3. Errors are enum variants, never String
//! 4. Every error maps to exactly one [`ErrorKind`]

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Stable error classification.
///
/// The HTTP layer (outside this workspace) maps each kind to a status code
/// without looking at message text.
///
/// ```text
/// Validation        → 400    never retried
/// NotFound          → 404    never retried
/// Conflict          → 409    retry budget exhausted / has children / locked
/// TransientStorage  → 503    retried internally by allocators
/// Internal          → 500
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    TransientStorage,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Account still has child accounts attached.
    ///
    /// ## When This Occurs
    /// ```text
    /// 1 Assets
    /// ├── 1.1 Current Assets   ← delete requested
    /// │   └── 1.1.1 Cash       ← child exists
    ///      │
    ///      ▼
    /// AccountHasChildren { code: "1.1", children: 1 }
    /// ```
    #[error("Cannot delete account with children: {code} has {children} child account(s)")]
    AccountHasChildren { code: String, children: i64 },

    /// Document is in a status that forbids the requested change.
    ///
    /// ## When This Occurs
    /// - Updating a purchase order that was already sent
    /// - Deleting a requisition that was converted to a purchase order
    #[error("Document {number} is {status}, cannot {operation}")]
    DocumentLocked {
        number: String,
        status: String,
        operation: String,
    },

    /// Requested status change is not a step the document's lifecycle has.
    ///
    /// ## When This Occurs
    /// - Moving a converted requisition back to draft
    /// - Setting `converted` or `fully_received` by hand
    #[error("Document {number} cannot move from {from} to {to}")]
    InvalidTransition {
        number: String,
        from: String,
        to: String,
    },

    /// Document was already converted into another document.
    #[error("Document {number} has already been converted")]
    AlreadyConverted { number: String },

    /// Allocation kept colliding with concurrent writers.
    #[error("Could not allocate a unique {what} after {attempts} attempts")]
    AllocationExhausted { what: String, attempts: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AccountHasChildren { .. }
            | CoreError::DocumentLocked { .. }
            | CoreError::InvalidTransition { .. }
            | CoreError::AlreadyConverted { .. }
            | CoreError::AllocationExhausted { .. } => ErrorKind::Conflict,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Always surfaced immediately; never retried.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., malformed display number or account code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Parent/child levels of an account do not line up.
    #[error("parent account at level {parent_level} cannot hold a child at level {level}")]
    LevelMismatch { parent_level: u8, level: u8 },
}

impl ValidationError {
    /// Creates an InvalidFormat error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a NotAllowed error from a list of allowed values.
    pub fn not_allowed(field: impl Into<String>, allowed: &[&str]) -> Self {
        ValidationError::NotAllowed {
            field: field.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::AccountHasChildren {
            code: "1.1".to_string(),
            children: 2,
        };
        assert_eq!(
            err.to_string(),
            "Cannot delete account with children: 1.1 has 2 child account(s)"
        );

        let err = CoreError::AllocationExhausted {
            what: "display number".to_string(),
            attempts: 5,
        };
        assert_eq!(
            err.to_string(),
            "Could not allocate a unique display number after 5 attempts"
        );

        let err = CoreError::InvalidTransition {
            number: "PR24030001".to_string(),
            from: "converted".to_string(),
            to: "draft".to_string(),
        };
        assert_eq!(err.to_string(), "Document PR24030001 cannot move from converted to draft");
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::LevelMismatch {
            parent_level: 1,
            level: 3,
        };
        assert_eq!(
            err.to_string(),
            "parent account at level 1 cannot hold a child at level 3"
        );
    }

    #[test]
    fn test_kinds_are_stable() {
        let validation: CoreError = ValidationError::Negative {
            field: "quantity".to_string(),
        }
        .into();
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let locked = CoreError::DocumentLocked {
            number: "PO24030001".to_string(),
            status: "sent".to_string(),
            operation: "update".to_string(),
        };
        assert_eq!(locked.kind(), ErrorKind::Conflict);
    }
}
