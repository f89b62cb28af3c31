//! # orbit-db: Persistence Layer for Orbit ERP
//!
//! SQLite storage for issued identifiers, job numbers, the chart of accounts
//! and line-item documents, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Orbit ERP Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (external)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     orbit-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ DocumentRepo   │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ AccountRepo    │    │              │  │   │
//! │  │   │ OrbitConfig   │    │ JobNumberRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────┬────────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                        with_allocation_retry (retry.rs)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SQLite (WAL)  identifiers · accounts · documents · line_items  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `OrbitConfig` (defaults, TOML file, `ORBIT_*` env vars)
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`retry`] - Bounded retry for number and code allocation
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orbit_db::{Database, OrbitConfig};
//!
//! let config = OrbitConfig::load(Some(Path::new("orbit.toml")))?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let invoice = config.new_document(DocumentKind::Invoice, company_id, user_id)?
//!     .item(LineItemInput::new("Consulting", 3, 15_000));
//! let detail = db.documents().create(invoice).await?;
//! println!("{} {}", detail.document.number, detail.document.grand_total());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, OrbitConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::{AccountRepository, AccountUpdate, NewAccount};
pub use repository::document::{
    DocumentDetail, DocumentFilter, DocumentRepository, DocumentUpdate, NewDocument, Receipt,
};
pub use repository::identifier::{IdentifierFilter, IdentifierRepository};
pub use repository::job_number::JobNumberRepository;
