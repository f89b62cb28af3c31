//! # Repository Module
//!
//! Database repository implementations for Orbit ERP.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Repositories                                   │
//! │                                                                         │
//! │  db.documents().create(new_invoice)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DocumentRepository ──────────► identifier::issue(tx, ...)             │
//! │       │                          (shared transaction helpers)           │
//! │       │                                ▲                                │
//! │       │                                │                                │
//! │  JobNumberRepository ──────────────────┘                                │
//! │                                                                         │
//! │  AccountRepository   (own allocation: sibling codes → max + 1)         │
//! │  IdentifierRepository (read side + reference slots)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`IdentifierRepository`](identifier::IdentifierRepository) - Issued numbers and cross references
//! - [`JobNumberRepository`](job_number::JobNumberRepository) - Job number generation
//! - [`AccountRepository`](account::AccountRepository) - Chart of accounts
//! - [`DocumentRepository`](document::DocumentRepository) - Invoices, quotations, POs, PRs

pub mod account;
pub mod document;
pub mod identifier;
pub mod job_number;
