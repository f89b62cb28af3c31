//! # Job Number Repository
//!
//! Job numbers (`Q_2024_0`, `W_2024_12`, `INV_2024_3`) are identifiers that
//! exist on their own and get linked to quotations, invoices, companies,
//! procurement documents and fixed assets through their reference slots.

use chrono::{Datelike, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::identifier::{self, NewIdentifier};
use crate::retry::with_allocation_retry;
use orbit_core::identifier::{DocumentType, JobCategory, SequenceKey};
use orbit_core::validation::validate_name;
use orbit_core::{IdentifierRecord, RecordStatus, MAX_NAME_LENGTH};

/// Repository for job numbers.
#[derive(Debug, Clone)]
pub struct JobNumberRepository {
    pool: SqlitePool,
    max_attempts: u32,
}

impl JobNumberRepository {
    /// Creates a new JobNumberRepository.
    pub fn new(pool: SqlitePool, max_attempts: u32) -> Self {
        JobNumberRepository { pool, max_attempts }
    }

    /// Issues the next job number of `category` for the current year.
    pub async fn generate(
        &self,
        category: JobCategory,
        description: Option<&str>,
    ) -> DbResult<IdentifierRecord> {
        self.generate_for_year(category, Utc::now().year(), description)
            .await
    }

    /// Issues the next job number of `category` for `year`.
    pub async fn generate_for_year(
        &self,
        category: JobCategory,
        year: i32,
        description: Option<&str>,
    ) -> DbResult<IdentifierRecord> {
        if let Some(description) = description {
            validate_name("description", description, MAX_NAME_LENGTH)?;
        }
        let key = SequenceKey::new(DocumentType::Job(category), year, None)?;

        let repo = self;
        let record = with_allocation_retry("job number", self.max_attempts, move |_| {
            repo.try_issue(key, description)
        })
        .await?;

        info!(job_number = %record.display_number, "Job number generated");
        Ok(record)
    }

    async fn try_issue(
        &self,
        key: SequenceKey,
        description: Option<&str>,
    ) -> DbResult<IdentifierRecord> {
        let mut tx = begin_write(&self.pool).await?;
        let record = identifier::issue(
            &mut tx,
            NewIdentifier {
                key,
                description,
                document_id: None,
                reference: None,
            },
        )
        .await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Replaces the free-text description.
    pub async fn update_description(
        &self,
        number: &str,
        description: Option<&str>,
    ) -> DbResult<IdentifierRecord> {
        if let Some(description) = description {
            validate_name("description", description, MAX_NAME_LENGTH)?;
        }

        let result = sqlx::query(
            "UPDATE identifiers SET description = ?2, updated_at = ?3 WHERE display_number = ?1",
        )
        .bind(number)
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Job number", number));
        }
        self.require(number).await
    }

    /// Activates or deactivates a job number.
    pub async fn set_status(&self, number: &str, status: RecordStatus) -> DbResult<IdentifierRecord> {
        let result = sqlx::query(
            "UPDATE identifiers SET status = ?2, updated_at = ?3 WHERE display_number = ?1",
        )
        .bind(number)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Job number", number));
        }
        self.require(number).await
    }

    async fn require(&self, number: &str) -> DbResult<IdentifierRecord> {
        let mut conn = self.pool.acquire().await?;
        identifier::find_by_number(&mut conn, number)
            .await?
            .ok_or_else(|| DbError::not_found("Job number", number))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use orbit_core::identifier::{parse, IdentifierFormat, JobCategory};
    use orbit_core::{ErrorKind, RecordStatus};
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_generate_sequence() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let jobs = db.job_numbers();

        let first = jobs
            .generate_for_year(JobCategory::Q, 2024, Some("Site survey"))
            .await
            .unwrap();
        let second = jobs.generate_for_year(JobCategory::Q, 2024, None).await.unwrap();
        let other = jobs.generate_for_year(JobCategory::S, 2024, None).await.unwrap();

        assert_eq!(first.display_number, "Q_2024_0");
        assert_eq!(second.display_number, "Q_2024_1");
        assert_eq!(other.display_number, "S_2024_0");
        assert_eq!(first.description.as_deref(), Some("Site survey"));

        let parsed = parse(IdentifierFormat::Job, &second.display_number).unwrap();
        assert_eq!(parsed.sequence, 1);
    }

    #[tokio::test]
    async fn test_update_description_and_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let jobs = db.job_numbers();
        let job = jobs.generate_for_year(JobCategory::W, 2024, None).await.unwrap();

        let updated = jobs
            .update_description(&job.display_number, Some("Warehouse fit-out"))
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Warehouse fit-out"));

        let inactive = jobs
            .set_status(&job.display_number, RecordStatus::Inactive)
            .await
            .unwrap();
        assert_eq!(inactive.status, RecordStatus::Inactive);
        assert_eq!(inactive.sequence, job.sequence);

        let err = jobs.set_status("W_2024_42", RecordStatus::Active).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_bad_year() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .job_numbers()
            .generate_for_year(JobCategory::M, 99, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    /// Real writers on separate connections racing for one key.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_generation_is_unique() {
        const WRITERS: usize = 12;

        let path = std::env::temp_dir().join(format!("orbit-jobs-{}.db", uuid::Uuid::new_v4()));
        let config = DbConfig::new(&path).max_connections(4);
        let db = Database::new(config).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..WRITERS {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.job_numbers()
                    .generate_for_year(JobCategory::Q, 2024, None)
                    .await
            }));
        }

        let mut numbers = HashSet::new();
        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            assert!(numbers.insert(record.sequence));
        }

        let expected: HashSet<i64> = (0..WRITERS as i64).collect();
        assert_eq!(numbers, expected);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
