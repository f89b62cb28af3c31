//! # Bounded Allocation Retry
//!
//! Drives a read-compute-write allocation until it commits or the attempt
//! budget runs out.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1 ── read MAX ── compute next ── INSERT ── COMMIT ──► Success  │
//! │      │                                      │                          │
//! │      │                      UNIQUE / BUSY ◄─┘                          │
//! │      ▼                                                                  │
//! │  attempt 2 ── read MAX (sees the winner's row) ── ...                  │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  attempt N failed ──► CoreError::AllocationExhausted (Conflict)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no in-process lock. Correctness rests on the UNIQUE indexes.
//! Attempts run in `BEGIN IMMEDIATE` transactions ([`crate::pool::begin_write`]),
//! so writers queue on SQLite's busy timeout and a collision only happens when
//! the lock wait itself times out or another process writes outside that
//! protocol. Every failed attempt means some other writer made progress.

use std::future::Future;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use orbit_core::CoreError;

/// Default number of attempts per allocation.
pub const DEFAULT_ALLOCATION_ATTEMPTS: u32 = 5;

/// Outcome of a single allocation attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    /// Committed.
    Success(T),
    /// Lost a race; worth re-reading and trying again.
    ConflictRetry(DbError),
    /// Any other failure; surfaced as is.
    Failed(DbError),
}

impl<T> From<DbResult<T>> for Attempt<T> {
    fn from(result: DbResult<T>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(e) if e.is_retryable() => Attempt::ConflictRetry(e),
            Err(e) => Attempt::Failed(e),
        }
    }
}

/// Runs `attempt` up to `max_attempts` times.
///
/// `attempt` receives the 1-based attempt number and must redo the whole
/// read-compute-write cycle inside its own transaction.
///
/// ## Example
/// ```rust,ignore
/// let record = with_allocation_retry("job number", 5, move |_| {
///     repo.try_issue(key, description)
/// })
/// .await?;
/// ```
pub async fn with_allocation_retry<T, F, Fut>(
    what: &str,
    max_attempts: u32,
    mut attempt: F,
) -> DbResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let max_attempts = max_attempts.max(1);

    for n in 1..=max_attempts {
        match Attempt::from(attempt(n).await) {
            Attempt::Success(value) => {
                if n > 1 {
                    debug!(what = %what, attempt = n, "Allocation succeeded after retry");
                }
                return Ok(value);
            }
            Attempt::ConflictRetry(e) => {
                warn!(
                    what = %what,
                    attempt = n,
                    max_attempts = max_attempts,
                    error = %e,
                    "Allocation collided with a concurrent writer"
                );
            }
            Attempt::Failed(e) => return Err(e),
        }
    }

    Err(CoreError::AllocationExhausted {
        what: what.to_string(),
        attempts: max_attempts,
    }
    .into())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;

        let value = with_allocation_retry("display number", 5, move |n| async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            if n < 3 {
                Err(DbError::duplicate("identifiers.display_number", "INV24030001"))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_conflict() {
        let err = with_allocation_retry("account code", 4, |_| async {
            Err::<(), _>(DbError::Busy("database is locked".into()))
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(matches!(
            err,
            DbError::Core(CoreError::AllocationExhausted { attempts: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;

        let err = with_allocation_retry("account code", 5, move |_| async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DbError::not_found("Account", "parent"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_still_tries_once() {
        let value = with_allocation_retry("job number", 0, |_| async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
