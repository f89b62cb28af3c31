//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError / ValidationError        │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  DbError (this module) ◄───────────────────┘                            │
//! │       │                                                                 │
//! │       ├── is_retryable()? ──► allocation loop tries again              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  kind() → ErrorKind ← stable classification for the HTTP layer         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use orbit_core::{CoreError, ErrorKind, ValidationError};
use thiserror::Error;

/// SQLite primary result codes that mean "try again".
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Unknown document, account or display number
    /// - Parent account id doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two writers computed the same display number
    /// - Two writers computed the same account code for a company
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Line item references an account that doesn't exist
    /// - Deleting an account still referenced as a parent
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// SQLite reported BUSY or LOCKED; another writer holds the lock.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Business rule violation from orbit-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether an allocation attempt that failed with this error may be
    /// re-run from the read step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. } | DbError::Busy(_))
    }

    /// Returns the stable classification of this error.
    ///
    /// ```text
    /// NotFound, ForeignKeyViolation          → NotFound
    /// UniqueViolation                        → Conflict
    /// Busy, PoolExhausted                    → TransientStorage
    /// Core(e)                                → e.kind()
    /// Validation                             → Validation
    /// everything else                        → Internal
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } | DbError::ForeignKeyViolation { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } => ErrorKind::Conflict,
            DbError::Busy(_) | DbError::PoolExhausted => ErrorKind::TransientStorage,
            DbError::Core(e) => e.kind(),
            DbError::Validation(_) => ErrorKind::Validation,
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → unique / foreign key / busy / other
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                if db_err.is_unique_violation() {
                    // "UNIQUE constraint failed: <table>.<column>[, ...]"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation { message: msg }
                } else if is_busy_code(db_err.code().as_deref()) {
                    DbError::Busy(msg)
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Extended result codes keep the primary code in the low byte
/// (SQLITE_BUSY_SNAPSHOT = 517 = 5 | 2 << 8).
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i64>().ok())
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_codes() {
        assert!(is_busy_code(Some("5")));
        assert!(is_busy_code(Some("6")));
        assert!(is_busy_code(Some("517")));
        assert!(is_busy_code(Some("262")));
        assert!(!is_busy_code(Some("2067")));
        assert!(!is_busy_code(None));
    }

    #[test]
    fn test_retryable() {
        assert!(DbError::duplicate("identifiers.display_number", "INV24030001").is_retryable());
        assert!(DbError::Busy("database is locked".into()).is_retryable());
        assert!(!DbError::not_found("Account", "x").is_retryable());
        assert!(!DbError::PoolExhausted.is_retryable());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(DbError::not_found("Account", "x").kind(), ErrorKind::NotFound);
        assert_eq!(DbError::duplicate("code", "1").kind(), ErrorKind::Conflict);
        assert_eq!(DbError::Busy("x".into()).kind(), ErrorKind::TransientStorage);

        let exhausted: DbError = CoreError::AllocationExhausted {
            what: "display number".into(),
            attempts: 5,
        }
        .into();
        assert_eq!(exhausted.kind(), ErrorKind::Conflict);

        let invalid: DbError = ValidationError::Required {
            field: "name".into(),
        }
        .into();
        assert_eq!(invalid.kind(), ErrorKind::Validation);
    }
}
