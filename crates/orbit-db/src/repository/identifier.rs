//! # Identifier Repository
//!
//! Issued display numbers: the sequence counter and the reference slots.
//!
//! ## Sequence Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  key = (INV, 2024, 03)                                                  │
//! │                                                                         │
//! │  SELECT MAX(sequence) FROM identifiers                                 │
//! │   WHERE document_type = 'INV' AND year = 2024 AND month IS 3           │
//! │       │                                                                 │
//! │       ├── NULL → starting value (1 for INV/QT/PO/PR, 0 for jobs)       │
//! │       └── 6    → 7                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT ... display_number = 'INV24030007'                             │
//! │       │                                                                 │
//! │       └── UNIQUE constraint failed? → caller's retry loop re-reads MAX │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The read and the insert run on the caller's transaction, together with
//! whatever document the number belongs to.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use orbit_core::identifier::{DocumentType, SequenceKey};
use orbit_core::{IdentifierRecord, RecordStatus, ReferenceField};

const IDENTIFIER_COLUMNS: &str = r#"
    id, display_number, document_type, year, month, sequence,
    description, status,
    quotation_ref, invoice_ref, company_ref, procurement_ref, fixed_asset_ref,
    document_id, created_at, updated_at
"#;

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw `identifiers` row; `document_type` is parsed on conversion.
#[derive(Debug, sqlx::FromRow)]
struct IdentifierRow {
    id: String,
    display_number: String,
    document_type: String,
    year: i32,
    month: Option<u32>,
    sequence: i64,
    description: Option<String>,
    status: RecordStatus,
    quotation_ref: Option<String>,
    invoice_ref: Option<String>,
    company_ref: Option<String>,
    procurement_ref: Option<String>,
    fixed_asset_ref: Option<String>,
    document_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentifierRow> for IdentifierRecord {
    type Error = DbError;

    fn try_from(row: IdentifierRow) -> Result<Self, Self::Error> {
        Ok(IdentifierRecord {
            id: row.id,
            display_number: row.display_number,
            document_type: row.document_type.parse()?,
            year: row.year,
            month: row.month,
            sequence: row.sequence,
            description: row.description,
            status: row.status,
            quotation_ref: row.quotation_ref,
            invoice_ref: row.invoice_ref,
            company_ref: row.company_ref,
            procurement_ref: row.procurement_ref,
            fixed_asset_ref: row.fixed_asset_ref,
            document_id: row.document_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all(rows: Vec<IdentifierRow>) -> DbResult<Vec<IdentifierRecord>> {
    rows.into_iter().map(IdentifierRecord::try_from).collect()
}

// =============================================================================
// Transaction-Scoped Operations
// =============================================================================

/// What to issue inside a caller's transaction.
#[derive(Debug, Clone)]
pub(crate) struct NewIdentifier<'a> {
    pub key: SequenceKey,
    pub description: Option<&'a str>,
    /// Business document named by this number.
    pub document_id: Option<&'a str>,
    /// Reference slot filled at creation.
    pub reference: Option<(ReferenceField, &'a str)>,
}

/// Highest sequence already issued for `key`.
pub(crate) async fn max_sequence(
    conn: &mut SqliteConnection,
    key: &SequenceKey,
) -> DbResult<Option<i64>> {
    let max: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT MAX(sequence)
        FROM identifiers
        WHERE document_type = ?1 AND year = ?2 AND month IS ?3
        "#,
    )
    .bind(key.document_type.as_str())
    .bind(key.year)
    .bind(key.month)
    .fetch_one(&mut *conn)
    .await?;

    Ok(max)
}

/// Reads the current maximum, renders the next number and inserts it.
///
/// A concurrent writer that got there first makes the insert fail with a
/// unique violation; the caller's retry loop runs the whole cycle again.
pub(crate) async fn issue(
    conn: &mut SqliteConnection,
    new: NewIdentifier<'_>,
) -> DbResult<IdentifierRecord> {
    let current = max_sequence(&mut *conn, &new.key).await?;
    let sequence = new.key.next_after(current);
    let display_number = new.key.display(sequence)?;
    let now = Utc::now();

    let mut record = IdentifierRecord {
        id: Uuid::new_v4().to_string(),
        display_number,
        document_type: new.key.document_type,
        year: new.key.year,
        month: new.key.month,
        sequence,
        description: new.description.map(str::to_string),
        status: RecordStatus::Active,
        quotation_ref: None,
        invoice_ref: None,
        company_ref: None,
        procurement_ref: None,
        fixed_asset_ref: None,
        document_id: new.document_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    };

    if let Some((field, value)) = new.reference {
        let slot = match field {
            ReferenceField::Quotation => &mut record.quotation_ref,
            ReferenceField::Invoice => &mut record.invoice_ref,
            ReferenceField::Company => &mut record.company_ref,
            ReferenceField::Procurement => &mut record.procurement_ref,
            ReferenceField::FixedAsset => &mut record.fixed_asset_ref,
        };
        *slot = Some(value.to_string());
    }

    debug!(
        display_number = %record.display_number,
        document_type = %record.document_type,
        sequence = record.sequence,
        "Issuing identifier"
    );

    sqlx::query(
        r#"
        INSERT INTO identifiers (
            id, display_number, document_type, year, month, sequence,
            description, status,
            quotation_ref, invoice_ref, company_ref, procurement_ref, fixed_asset_ref,
            document_id, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8,
            ?9, ?10, ?11, ?12, ?13,
            ?14, ?15, ?16
        )
        "#,
    )
    .bind(&record.id)
    .bind(&record.display_number)
    .bind(record.document_type.as_str())
    .bind(record.year)
    .bind(record.month)
    .bind(record.sequence)
    .bind(&record.description)
    .bind(record.status)
    .bind(&record.quotation_ref)
    .bind(&record.invoice_ref)
    .bind(&record.company_ref)
    .bind(&record.procurement_ref)
    .bind(&record.fixed_asset_ref)
    .bind(&record.document_id)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(record)
}

/// Fetches by display number on the caller's connection.
pub(crate) async fn find_by_number(
    conn: &mut SqliteConnection,
    number: &str,
) -> DbResult<Option<IdentifierRecord>> {
    let row: Option<IdentifierRow> = sqlx::query_as(&format!(
        "SELECT {} FROM identifiers WHERE display_number = ?1",
        IDENTIFIER_COLUMNS
    ))
    .bind(number)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(IdentifierRecord::try_from).transpose()
}

/// Sets (or clears, with `None`) one reference slot of a record.
pub(crate) async fn write_reference(
    conn: &mut SqliteConnection,
    number: &str,
    field: ReferenceField,
    value: Option<&str>,
) -> DbResult<()> {
    // column names come from a closed enum, never from input
    let result = sqlx::query(&format!(
        "UPDATE identifiers SET {} = ?2, updated_at = ?3 WHERE display_number = ?1",
        field.column()
    ))
    .bind(number)
    .bind(value)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Identifier", number));
    }
    Ok(())
}

/// Clears `field` on every record that points at `value`.
pub(crate) async fn clear_references_to(
    conn: &mut SqliteConnection,
    field: ReferenceField,
    value: &str,
) -> DbResult<u64> {
    let result = sqlx::query(&format!(
        "UPDATE identifiers SET {col} = NULL, updated_at = ?2 WHERE {col} = ?1",
        col = field.column()
    ))
    .bind(value)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Removes the number issued for a business document.
pub(crate) async fn delete_for_document(
    conn: &mut SqliteConnection,
    document_id: &str,
) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM identifiers WHERE document_id = ?1")
        .bind(document_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Repository
// =============================================================================

/// Filter for [`IdentifierRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct IdentifierFilter {
    pub document_type: Option<DocumentType>,
    pub year: Option<i32>,
    pub status: Option<RecordStatus>,
    /// Default: 100
    pub limit: Option<u32>,
}

/// Repository for issued identifiers.
#[derive(Debug, Clone)]
pub struct IdentifierRepository {
    pool: SqlitePool,
}

impl IdentifierRepository {
    /// Creates a new IdentifierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IdentifierRepository { pool }
    }

    /// The sequence the next issue for `key` would receive.
    ///
    /// Informational only: a concurrent writer may take it first. Issuing
    /// always goes through the retrying create paths.
    pub async fn next_sequence(&self, key: &SequenceKey) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let current = max_sequence(&mut conn, key).await?;
        Ok(key.next_after(current))
    }

    /// Gets a record by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<IdentifierRecord>> {
        let row: Option<IdentifierRow> = sqlx::query_as(&format!(
            "SELECT {} FROM identifiers WHERE id = ?1",
            IDENTIFIER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IdentifierRecord::try_from).transpose()
    }

    /// Gets a record by display number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<IdentifierRecord>> {
        let mut conn = self.pool.acquire().await?;
        find_by_number(&mut conn, number).await
    }

    /// Lists records, newest sequence first.
    pub async fn list(&self, filter: &IdentifierFilter) -> DbResult<Vec<IdentifierRecord>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM identifiers WHERE 1 = 1",
            IDENTIFIER_COLUMNS
        ));

        if let Some(document_type) = filter.document_type {
            qb.push(" AND document_type = ").push_bind(document_type.as_str());
        }
        if let Some(year) = filter.year {
            qb.push(" AND year = ").push_bind(year);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY document_type, year DESC, month DESC, sequence DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(100));

        let rows = qb.build_query_as::<IdentifierRow>().fetch_all(&self.pool).await?;
        convert_all(rows)
    }

    /// Attaches (`Some`) or detaches (`None`) a cross reference.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let field: ReferenceField = "quotation_ref".parse()?; // unknown names are rejected
    /// repo.set_reference("Q_2024_3", field, Some(&quotation.id)).await?;
    /// ```
    pub async fn set_reference(
        &self,
        number: &str,
        field: ReferenceField,
        value: Option<&str>,
    ) -> DbResult<IdentifierRecord> {
        debug!(number = %number, field = field.column(), attach = value.is_some(), "Updating reference");

        let mut conn = self.pool.acquire().await?;
        write_reference(&mut conn, number, field, value).await?;
        find_by_number(&mut conn, number)
            .await?
            .ok_or_else(|| DbError::not_found("Identifier", number))
    }

    /// Total number of issued identifiers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identifiers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use orbit_core::identifier::JobCategory;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn issue_on(db: &Database, key: SequenceKey) -> IdentifierRecord {
        let mut tx = db.pool().begin().await.unwrap();
        let record = issue(
            &mut tx,
            NewIdentifier {
                key,
                description: None,
                document_id: None,
                reference: None,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_starting_values_per_type() {
        let db = db().await;
        let repo = db.identifiers();

        let inv = SequenceKey::new(DocumentType::Invoice, 2024, Some(3)).unwrap();
        let job = SequenceKey::new(DocumentType::Job(JobCategory::Q), 2024, None).unwrap();

        assert_eq!(repo.next_sequence(&inv).await.unwrap(), 1);
        assert_eq!(repo.next_sequence(&job).await.unwrap(), 0);

        assert_eq!(issue_on(&db, inv).await.display_number, "INV24030001");
        assert_eq!(issue_on(&db, job).await.display_number, "Q_2024_0");
        assert_eq!(repo.next_sequence(&inv).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let db = db().await;

        let march = SequenceKey::new(DocumentType::Invoice, 2024, Some(3)).unwrap();
        let april = SequenceKey::new(DocumentType::Invoice, 2024, Some(4)).unwrap();
        let quote = SequenceKey::new(DocumentType::Quotation, 2024, Some(3)).unwrap();

        issue_on(&db, march).await;
        issue_on(&db, march).await;

        assert_eq!(issue_on(&db, april).await.display_number, "INV24040001");
        assert_eq!(issue_on(&db, quote).await.display_number, "QT24030001");
        assert_eq!(issue_on(&db, march).await.display_number, "INV24030003");
    }

    #[tokio::test]
    async fn test_year_rollover_restarts() {
        let db = db().await;
        let y24 = SequenceKey::new(DocumentType::Job(JobCategory::W), 2024, None).unwrap();
        let y25 = SequenceKey::new(DocumentType::Job(JobCategory::W), 2025, None).unwrap();

        issue_on(&db, y24).await;
        issue_on(&db, y24).await;

        assert_eq!(issue_on(&db, y25).await.display_number, "W_2025_0");
    }

    #[tokio::test]
    async fn test_duplicate_number_is_unique_violation() {
        let db = db().await;
        let key = SequenceKey::new(DocumentType::PurchaseOrder, 2024, Some(1)).unwrap();
        let first = issue_on(&db, key).await;

        // Re-insert the same number as a racing writer would.
        let err = sqlx::query(
            "INSERT INTO identifiers (id, display_number, document_type, year, month, sequence, status, created_at, updated_at)
             VALUES ('x', ?1, 'PO', 2024, 1, 1, 'active', ?2, ?2)",
        )
        .bind(&first.display_number)
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .map_err(DbError::from)
        .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_set_reference() {
        let db = db().await;
        let repo = db.identifiers();
        let key = SequenceKey::new(DocumentType::Job(JobCategory::M), 2024, None).unwrap();
        let job = issue_on(&db, key).await;

        let updated = repo
            .set_reference(&job.display_number, ReferenceField::Company, Some("company-1"))
            .await
            .unwrap();
        assert_eq!(updated.reference(ReferenceField::Company), Some("company-1"));
        assert_eq!(updated.display_number, job.display_number);
        assert_eq!(updated.sequence, job.sequence);

        let cleared = repo
            .set_reference(&job.display_number, ReferenceField::Company, None)
            .await
            .unwrap();
        assert!(cleared.company_ref.is_none());

        let missing = repo
            .set_reference("M_2024_99", ReferenceField::Company, Some("c"))
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), orbit_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let db = db().await;
        let repo = db.identifiers();
        let inv = SequenceKey::new(DocumentType::Invoice, 2024, Some(5)).unwrap();
        let job = SequenceKey::new(DocumentType::Job(JobCategory::S), 2024, None).unwrap();

        issue_on(&db, inv).await;
        issue_on(&db, inv).await;
        issue_on(&db, job).await;

        assert_eq!(repo.count().await.unwrap(), 3);

        let invoices = repo
            .list(&IdentifierFilter {
                document_type: Some(DocumentType::Invoice),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[0].display_number, "INV24050002");

        let fetched = repo.get_by_id(&invoices[1].id).await.unwrap().unwrap();
        assert_eq!(fetched.document_type, DocumentType::Invoice);
    }
}
