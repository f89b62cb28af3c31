//! # orbit-core: Numbering, Chart of Accounts and Totals for Orbit ERP
//!
//! Pure business logic with zero I/O dependencies. The database crate
//! (`orbit-db`) drives these functions inside its transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Orbit ERP Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              REST API (external, not in this workspace)         │   │
//! │  │    /invoices  /quotations  /purchase-orders  /accounts  ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    orbit-db (Database Layer)                    │   │
//! │  │      repositories, bounded-retry allocation, migrations         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ orbit-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐  │   │
//! │  │   │ identifier │ │  account   │ │   totals   │ │   money    │  │   │
//! │  │   │ INV24030007│ │  "1.2.3"   │ │ sub/tax/   │ │  cents     │  │   │
//! │  │   │ Q_2024_0   │ │  allocate  │ │ discount   │ │  bps       │  │   │
//! │  │   └────────────┘ └────────────┘ └────────────┘ └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`identifier`] - Display number formats, sequence keys, format/parse
//! - [`account`] - Dotted account codes and the code allocator
//! - [`totals`] - Line totals, VAT, discount, grand total
//! - [`money`] - Integer money
//! - [`types`] - Domain types (Account, Document, IdentifierRecord, ...)
//! - [`error`] - Error types and the stable [`ErrorKind`]
//! - [`validation`] - Field validators
//!
//! ## Example Usage
//!
//! ```rust
//! use orbit_core::identifier::{DocumentType, SequenceKey};
//!
//! let key = SequenceKey::new(DocumentType::Invoice, 2024, Some(3)).unwrap();
//! let seq = key.next_after(Some(6));
//! assert_eq!(key.display(seq).unwrap(), "INV24030007");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod account;
pub mod error;
pub mod identifier;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Currency used when a document doesn't name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Maximum length of account and document names.
pub const MAX_NAME_LENGTH: usize = 200;
