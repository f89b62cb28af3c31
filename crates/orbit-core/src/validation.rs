//! # Validation Module
//!
//! Input validation utilities for Orbit ERP.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer (external)                                        │
//! │  └── Deserialization, required fields                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE + pure engines                                   │
//! │  ├── Names, currency codes, ids                                        │
//! │  └── Quantities per document kind                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE display numbers / account codes                            │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::DocumentKind;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum line items per document.
pub const MAX_LINE_ITEMS: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required, trimmed, length-limited text field.
///
/// ## Example
/// ```rust
/// use orbit_core::validation::validate_name;
///
/// assert!(validate_name("name", "Cash at Bank", 200).is_ok());
/// assert!(validate_name("name", "   ", 200).is_err());
/// ```
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an ISO 4217 style currency code (three uppercase letters).
///
/// ```rust
/// use orbit_core::validation::validate_currency;
///
/// assert!(validate_currency("USD").is_ok());
/// assert!(validate_currency("usd").is_err());
/// ```
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ValidationError::invalid_format(
            "currency",
            "must be a three-letter ISO code",
        ));
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity for a document kind.
///
/// ## Rules
/// ```text
/// Invoice / Quotation                     quantity >= 1
/// PurchaseOrder / PurchaseRequisition     quantity >= 0  (placeholder rows)
/// ```
pub fn validate_quantity(kind: DocumentKind, qty: i64) -> ValidationResult<()> {
    let min = match kind {
        DocumentKind::Invoice | DocumentKind::Quotation => 1,
        DocumentKind::PurchaseOrder | DocumentKind::PurchaseRequisition => 0,
    };

    if qty < min {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the number of line items on a document.
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "line items".to_string(),
            min: 0,
            max: MAX_LINE_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Accounts Receivable", 200).is_ok());
        assert!(validate_name("name", "", 200).is_err());
        assert!(validate_name("name", &"A".repeat(201), 200).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("EU").is_err());
        assert!(validate_currency("EU1").is_err());
    }

    #[test]
    fn test_validate_quantity_per_kind() {
        assert!(validate_quantity(DocumentKind::Invoice, 1).is_ok());
        assert!(validate_quantity(DocumentKind::Invoice, 0).is_err());
        assert!(validate_quantity(DocumentKind::PurchaseOrder, 0).is_ok());
        assert!(validate_quantity(DocumentKind::PurchaseRequisition, -1).is_err());
    }

    #[test]
    fn test_validate_item_count() {
        assert!(validate_item_count(0).is_ok());
        assert!(validate_item_count(MAX_LINE_ITEMS).is_ok());
        assert!(validate_item_count(MAX_LINE_ITEMS + 1).is_err());
    }
}
