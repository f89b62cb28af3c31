//! # Document Repository
//!
//! Invoices, quotations, purchase orders and purchase requisitions.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(NewDocument)                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate + compute_totals(items, tax, discount)   (pure, once)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌───────────────────── SINGLE TRANSACTION ─────────────────────────┐  │
//! │  │ 1. identifier::issue(key from issue_date)   → "INV24030007"      │  │
//! │  │ 2. job number                                                     │  │
//! │  │     ├── given     → set its invoice_ref / quotation_ref / ...    │  │
//! │  │     └── invoice   → issue "INV_2024_n" with invoice_ref = id     │  │
//! │  │ 3. INSERT documents + line_items                                  │  │
//! │  │ 4. conversions only: mark the source document converted           │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ├── UNIQUE / BUSY → rolled back, whole attempt retried            │
//! │       ▼                                                                 │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are never read from callers. Every write path recomputes them
//! from the items, tax rate and discount.
//!
//! ## Lifecycle
//! ```text
//! set_status     manual steps only (DocumentKind::allows_transition)
//! approve        PR  Draft | Submitted → Approved | Rejected
//!                PO  Draft → Sent (approved), stays Draft (rejected)
//! receive        PO  Sent | PartiallyReceived → PartiallyReceived | FullyReceived
//! convert_*      source → Converted, guarded in the creating transaction
//! ```

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::identifier::{self, NewIdentifier};
use crate::retry::with_allocation_retry;
use orbit_core::identifier::{DocumentType, JobCategory, SequenceKey};
use orbit_core::totals::{compute_totals, Discount, DocumentTotals, LineItemInput};
use orbit_core::validation::{
    validate_currency, validate_item_count, validate_name, validate_quantity,
};
use orbit_core::{
    receipt_status, ApprovalDecision, ApprovalRecord, CoreError, Document, DocumentKind,
    DocumentStatus, LineItem, ReferenceField, TaxRate, ValidationError, DEFAULT_CURRENCY,
    MAX_NAME_LENGTH,
};

/// Longest accepted line-item description or note.
pub const MAX_TEXT_LENGTH: usize = 2000;

const DOCUMENT_COLUMNS: &str = r#"
    id, kind, number, company_id, counterparty_id, currency, issue_date,
    tax_rate_bps, discount_mode, discount_value,
    subtotal_cents, tax_cents, discount_cents, grand_total_cents,
    status, job_number, source_document_id, notes, created_by,
    created_at, updated_at
"#;

const LINE_ITEM_COLUMNS: &str = r#"
    id, document_id, position, description, unit, quantity,
    unit_price_cents, total_cents, account_id, received_quantity
"#;

const APPROVAL_COLUMNS: &str = "id, document_id, approver_id, decision, comments, created_at";

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// Input for [`DocumentRepository::create`].
///
/// ## Example
/// ```rust,ignore
/// let invoice = NewDocument::new(DocumentKind::Invoice, "company-1", "user-1")
///     .tax_rate(TaxRate::from_percent(10)?)
///     .discount(Discount::fixed(Money::from_cents(300))?)
///     .item(LineItemInput::new("Cable", 2, 1000))
///     .item(LineItemInput::new("Clip", 1, 500));
/// let detail = db.documents().create(invoice).await?;
/// assert_eq!(detail.document.grand_total_cents, 2450);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub kind: DocumentKind,
    pub company_id: String,
    pub counterparty_id: Option<String>,
    pub currency: String,
    /// Defaults to today; picks the year and month of the number.
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub tax_rate: TaxRate,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
    pub notes: Option<String>,
    pub created_by: String,
    /// Existing job number to link instead of issuing one.
    pub job_number: Option<String>,
}

impl NewDocument {
    pub fn new(
        kind: DocumentKind,
        company_id: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        NewDocument {
            kind,
            company_id: company_id.into(),
            counterparty_id: None,
            currency: DEFAULT_CURRENCY.to_string(),
            issue_date: None,
            tax_rate: TaxRate::zero(),
            discount: Discount::none(),
            items: Vec::new(),
            notes: None,
            created_by: created_by.into(),
            job_number: None,
        }
    }

    pub fn counterparty(mut self, id: impl Into<String>) -> Self {
        self.counterparty_id = Some(id.into());
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn issue_date(mut self, date: NaiveDate) -> Self {
        self.issue_date = Some(date);
        self
    }

    pub fn tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn discount(mut self, discount: Discount) -> Self {
        self.discount = discount;
        self
    }

    pub fn item(mut self, item: LineItemInput) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: Vec<LineItemInput>) -> Self {
        self.items = items;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn job_number(mut self, number: impl Into<String>) -> Self {
        self.job_number = Some(number.into());
        self
    }
}

/// Changes applied by [`DocumentRepository::update`]. `None` keeps a field.
///
/// Number, kind and issue date are fixed at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub counterparty_id: Option<Option<String>>,
    pub currency: Option<String>,
    pub tax_rate: Option<TaxRate>,
    pub discount: Option<Discount>,
    /// Replaces every line item.
    pub items: Option<Vec<LineItemInput>>,
    pub notes: Option<Option<String>>,
}

/// A document together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub document: Document,
    pub items: Vec<LineItem>,
}

/// Filter for [`DocumentRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub company_id: Option<String>,
    pub status: Option<DocumentStatus>,
    /// Default: 50
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Delivered quantity for one purchase-order line, as passed to
/// [`DocumentRepository::receive`]. Replaces the stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub line_item_id: String,
    pub received_quantity: i64,
}

impl Receipt {
    pub fn new(line_item_id: impl Into<String>, received_quantity: i64) -> Self {
        Receipt {
            line_item_id: line_item_id.into(),
            received_quantity,
        }
    }
}

/// Reference slot on a job number that points back at a document.
fn reference_field(kind: DocumentKind) -> ReferenceField {
    match kind {
        DocumentKind::Invoice => ReferenceField::Invoice,
        DocumentKind::Quotation => ReferenceField::Quotation,
        DocumentKind::PurchaseOrder | DocumentKind::PurchaseRequisition => {
            ReferenceField::Procurement
        }
    }
}

fn locked(document: &Document, operation: &str) -> DbError {
    CoreError::DocumentLocked {
        number: document.number.clone(),
        status: document.status.to_string(),
        operation: operation.to_string(),
    }
    .into()
}

fn validate_text(field: &str, value: &str) -> DbResult<()> {
    if value.chars().count() > MAX_TEXT_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LENGTH,
        }
        .into());
    }
    Ok(())
}

fn normalize_currency(currency: &str) -> DbResult<String> {
    let currency = currency.trim().to_ascii_uppercase();
    validate_currency(&currency)?;
    Ok(currency)
}

fn validate_items(kind: DocumentKind, items: &[LineItemInput]) -> DbResult<()> {
    validate_item_count(items.len())?;
    for item in items {
        validate_name("description", &item.description, MAX_TEXT_LENGTH)?;
        validate_quantity(kind, item.quantity)?;
    }
    Ok(())
}

fn validate_new(new: &NewDocument) -> DbResult<()> {
    validate_name("company", &new.company_id, MAX_NAME_LENGTH)?;
    validate_name("created_by", &new.created_by, MAX_NAME_LENGTH)?;
    if let Some(notes) = &new.notes {
        validate_text("notes", notes)?;
    }
    TaxRate::checked(new.tax_rate.bps())?;
    checked_discount(new.discount)?;
    validate_items(new.kind, &new.items)
}

/// Re-checks a discount that may have come straight from deserialization.
fn checked_discount(discount: Discount) -> DbResult<Discount> {
    Ok(Discount::new(discount.mode(), discount.raw_value())?)
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

async fn fetch_document(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Document>> {
    let document = sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents WHERE id = ?1",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(document)
}

async fn fetch_items(conn: &mut SqliteConnection, document_id: &str) -> DbResult<Vec<LineItem>> {
    let items = sqlx::query_as::<_, LineItem>(&format!(
        "SELECT {} FROM line_items WHERE document_id = ?1 ORDER BY position",
        LINE_ITEM_COLUMNS
    ))
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn insert_document(conn: &mut SqliteConnection, document: &Document) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (
            id, kind, number, company_id, counterparty_id, currency, issue_date,
            tax_rate_bps, discount_mode, discount_value,
            subtotal_cents, tax_cents, discount_cents, grand_total_cents,
            status, job_number, source_document_id, notes, created_by,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18, ?19,
            ?20, ?21
        )
        "#,
    )
    .bind(&document.id)
    .bind(document.kind)
    .bind(&document.number)
    .bind(&document.company_id)
    .bind(&document.counterparty_id)
    .bind(&document.currency)
    .bind(document.issue_date)
    .bind(document.tax_rate_bps)
    .bind(document.discount_mode)
    .bind(document.discount_value)
    .bind(document.subtotal_cents)
    .bind(document.tax_cents)
    .bind(document.discount_cents)
    .bind(document.grand_total_cents)
    .bind(document.status)
    .bind(&document.job_number)
    .bind(&document.source_document_id)
    .bind(&document.notes)
    .bind(&document.created_by)
    .bind(document.created_at)
    .bind(document.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts `items` at positions 0..n with their computed totals.
async fn insert_items(
    conn: &mut SqliteConnection,
    document_id: &str,
    items: &[LineItemInput],
    totals: &DocumentTotals,
) -> DbResult<Vec<LineItem>> {
    let mut stored = Vec::with_capacity(items.len());

    for (position, (input, total)) in items.iter().zip(&totals.line_totals).enumerate() {
        let item = LineItem {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            position: position as i64,
            description: input.description.trim().to_string(),
            unit: input.unit.clone(),
            quantity: input.quantity,
            unit_price_cents: input.unit_price_cents,
            total_cents: total.cents(),
            account_id: input.account_id.clone(),
            received_quantity: 0,
        };

        sqlx::query(
            r#"
            INSERT INTO line_items (
                id, document_id, position, description, unit, quantity,
                unit_price_cents, total_cents, account_id, received_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.document_id)
        .bind(item.position)
        .bind(&item.description)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_cents)
        .bind(&item.account_id)
        .bind(item.received_quantity)
        .execute(&mut *conn)
        .await?;

        stored.push(item);
    }

    Ok(stored)
}

/// Links `document_id` into a job number's slot for `kind`.
async fn link_job_number(
    conn: &mut SqliteConnection,
    number: &str,
    kind: DocumentKind,
    document_id: &str,
) -> DbResult<()> {
    let record = identifier::find_by_number(&mut *conn, number)
        .await?
        .ok_or_else(|| DbError::not_found("Job number", number))?;

    if !matches!(record.document_type, DocumentType::Job(_)) {
        return Err(ValidationError::invalid_format("job number", "not a job number").into());
    }

    identifier::write_reference(&mut *conn, number, reference_field(kind), Some(document_id)).await
}

async fn write_status(
    conn: &mut SqliteConnection,
    document: &mut Document,
    status: DocumentStatus,
) -> DbResult<()> {
    document.status = status;
    document.updated_at = Utc::now();

    sqlx::query("UPDATE documents SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&document.id)
        .bind(document.status)
        .bind(document.updated_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

fn to_inputs(items: Vec<LineItem>) -> Vec<LineItemInput> {
    items
        .into_iter()
        .map(|item| LineItemInput {
            description: item.description,
            unit: item.unit,
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            account_id: item.account_id,
        })
        .collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for line-item documents.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
    max_attempts: u32,
    auto_job_numbers: bool,
}

impl DocumentRepository {
    /// Creates a new DocumentRepository.
    pub fn new(pool: SqlitePool, max_attempts: u32, auto_job_numbers: bool) -> Self {
        DocumentRepository {
            pool,
            max_attempts,
            auto_job_numbers,
        }
    }

    /// Creates a document with a freshly issued number.
    ///
    /// ## Errors
    /// - `Validation`: bad items, currency, tax or discount
    /// - `NotFound`: the given job number doesn't exist
    /// - `Conflict`: allocation retry budget exhausted
    pub async fn create(&self, mut new: NewDocument) -> DbResult<DocumentDetail> {
        new.currency = normalize_currency(&new.currency)?;
        self.create_from(new, None).await
    }

    async fn create_from(
        &self,
        new: NewDocument,
        source: Option<&Document>,
    ) -> DbResult<DocumentDetail> {
        validate_new(&new)?;
        let totals = compute_totals(&new.items, new.tax_rate, new.discount)?;
        let issue_date = new.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let key = SequenceKey::for_date(new.kind.document_type(), issue_date)?;

        let what = format!("{} number", new.kind);
        let repo = self;
        let new_ref = &new;
        let totals_ref = &totals;
        let detail = with_allocation_retry(&what, self.max_attempts, move |_| {
            repo.try_create(new_ref, key, issue_date, totals_ref, source)
        })
        .await?;

        info!(
            number = %detail.document.number,
            kind = %detail.document.kind,
            grand_total = detail.document.grand_total_cents,
            job_number = ?detail.document.job_number,
            "Document created"
        );
        Ok(detail)
    }

    async fn try_create(
        &self,
        new: &NewDocument,
        key: SequenceKey,
        issue_date: NaiveDate,
        totals: &DocumentTotals,
        source: Option<&Document>,
    ) -> DbResult<DocumentDetail> {
        let mut tx = begin_write(&self.pool).await?;
        let document_id = Uuid::new_v4().to_string();

        let number = identifier::issue(
            &mut tx,
            NewIdentifier {
                key,
                description: None,
                document_id: Some(&document_id),
                reference: None,
            },
        )
        .await?;

        let job_number = match &new.job_number {
            Some(existing) => {
                link_job_number(&mut tx, existing, new.kind, &document_id).await?;
                Some(existing.clone())
            }
            None if self.auto_job_numbers && new.kind == DocumentKind::Invoice => {
                let job_key =
                    SequenceKey::new(DocumentType::Job(JobCategory::Inv), issue_date.year(), None)?;
                let job = identifier::issue(
                    &mut tx,
                    NewIdentifier {
                        key: job_key,
                        description: None,
                        document_id: None,
                        reference: Some((ReferenceField::Invoice, &document_id)),
                    },
                )
                .await?;
                Some(job.display_number)
            }
            None => None,
        };

        let now = Utc::now();
        let document = Document {
            id: document_id,
            kind: new.kind,
            number: number.display_number,
            company_id: new.company_id.trim().to_string(),
            counterparty_id: new.counterparty_id.clone(),
            currency: new.currency.clone(),
            issue_date,
            tax_rate_bps: new.tax_rate.bps(),
            discount_mode: new.discount.mode(),
            discount_value: new.discount.raw_value(),
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            discount_cents: totals.discount.cents(),
            grand_total_cents: totals.grand_total.cents(),
            status: DocumentStatus::Draft,
            job_number,
            source_document_id: source.map(|s| s.id.clone()),
            notes: new.notes.clone(),
            created_by: new.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        insert_document(&mut tx, &document).await?;
        let items = insert_items(&mut tx, &document.id, &new.items, totals).await?;

        if let Some(source) = source {
            let result = sqlx::query(
                "UPDATE documents SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status != ?2",
            )
            .bind(&source.id)
            .bind(DocumentStatus::Converted)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(CoreError::AlreadyConverted {
                    number: source.number.clone(),
                }
                .into());
            }
        }

        tx.commit().await?;
        Ok(DocumentDetail { document, items })
    }

    /// Gets a document by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Document>> {
        let mut conn = self.pool.acquire().await?;
        fetch_document(&mut conn, id).await
    }

    /// Gets a document by display number.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE number = ?1",
            DOCUMENT_COLUMNS
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    /// Line items of a document, in position order.
    pub async fn items(&self, document_id: &str) -> DbResult<Vec<LineItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, document_id).await
    }

    /// Document plus items.
    pub async fn detail(&self, id: &str) -> DbResult<Option<DocumentDetail>> {
        let mut conn = self.pool.acquire().await?;
        let Some(document) = fetch_document(&mut conn, id).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut conn, id).await?;
        Ok(Some(DocumentDetail { document, items }))
    }

    /// Lists documents, newest first.
    pub async fn list(&self, filter: &DocumentFilter) -> DbResult<Vec<Document>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM documents WHERE 1 = 1",
            DOCUMENT_COLUMNS
        ));

        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ").push_bind(kind);
        }
        if let Some(company_id) = &filter.company_id {
            qb.push(" AND company_id = ").push_bind(company_id.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY created_at DESC, number DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(50))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0));

        let documents = qb.build_query_as::<Document>().fetch_all(&self.pool).await?;

        debug!(count = documents.len(), "Listed documents");
        Ok(documents)
    }

    /// Applies `update` and recomputes totals.
    ///
    /// ## Errors
    /// - `NotFound`: unknown id
    /// - `Conflict`: purchase order already sent/received, requisition
    ///   already approved/converted
    pub async fn update(&self, id: &str, update: DocumentUpdate) -> DbResult<DocumentDetail> {
        let mut tx = begin_write(&self.pool).await?;

        let mut document = fetch_document(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        if document.kind.is_locked(document.status) {
            return Err(locked(&document, "update"));
        }

        if let Some(counterparty_id) = update.counterparty_id {
            document.counterparty_id = counterparty_id;
        }
        if let Some(currency) = update.currency {
            document.currency = normalize_currency(&currency)?;
        }
        if let Some(notes) = update.notes {
            document.notes = notes;
        }
        let tax_rate = match update.tax_rate {
            Some(rate) => TaxRate::checked(rate.bps())?,
            None => document.tax_rate(),
        };
        let discount = match update.discount {
            Some(discount) => checked_discount(discount)?,
            None => document.discount()?,
        };

        let replace_items = update.items.is_some();
        let inputs = match update.items {
            Some(items) => {
                validate_items(document.kind, &items)?;
                items
            }
            None => to_inputs(fetch_items(&mut tx, id).await?),
        };

        let totals = compute_totals(&inputs, tax_rate, discount)?;
        document.tax_rate_bps = tax_rate.bps();
        document.discount_mode = discount.mode();
        document.discount_value = discount.raw_value();
        document.subtotal_cents = totals.subtotal.cents();
        document.tax_cents = totals.tax.cents();
        document.discount_cents = totals.discount.cents();
        document.grand_total_cents = totals.grand_total.cents();
        document.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE documents SET
                counterparty_id = ?2,
                currency = ?3,
                tax_rate_bps = ?4,
                discount_mode = ?5,
                discount_value = ?6,
                subtotal_cents = ?7,
                tax_cents = ?8,
                discount_cents = ?9,
                grand_total_cents = ?10,
                notes = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(&document.id)
        .bind(&document.counterparty_id)
        .bind(&document.currency)
        .bind(document.tax_rate_bps)
        .bind(document.discount_mode)
        .bind(document.discount_value)
        .bind(document.subtotal_cents)
        .bind(document.tax_cents)
        .bind(document.discount_cents)
        .bind(document.grand_total_cents)
        .bind(&document.notes)
        .bind(document.updated_at)
        .execute(&mut *tx)
        .await?;

        let items = if replace_items {
            sqlx::query("DELETE FROM line_items WHERE document_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_items(&mut tx, id, &inputs, &totals).await?
        } else {
            // Stored line totals are rewritten from quantity × price too.
            for (position, total) in totals.line_totals.iter().enumerate() {
                sqlx::query(
                    "UPDATE line_items SET total_cents = ?3 WHERE document_id = ?1 AND position = ?2",
                )
                .bind(id)
                .bind(position as i64)
                .bind(total.cents())
                .execute(&mut *tx)
                .await?;
            }
            fetch_items(&mut tx, id).await?
        };

        tx.commit().await?;

        info!(
            number = %document.number,
            grand_total = document.grand_total_cents,
            "Document updated"
        );
        Ok(DocumentDetail { document, items })
    }

    /// Moves a document to `status` by hand.
    ///
    /// Only the manual steps of [`DocumentKind::allows_transition`] are
    /// accepted. Approval, receiving and conversion statuses have their own
    /// operations.
    ///
    /// ## Errors
    /// - `Validation`: `status` doesn't exist for this kind
    /// - `NotFound`: unknown id
    /// - `Conflict`: document is locked, or the step isn't allowed
    pub async fn set_status(&self, id: &str, status: DocumentStatus) -> DbResult<Document> {
        let mut tx = begin_write(&self.pool).await?;

        let mut document = fetch_document(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        let allowed = document.kind.allowed_statuses();
        if !allowed.contains(&status) {
            let names: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            return Err(ValidationError::not_allowed("status", &names).into());
        }
        if document.kind.is_locked(document.status) {
            return Err(locked(&document, "change status"));
        }
        if !document.kind.allows_transition(document.status, status) {
            return Err(CoreError::InvalidTransition {
                number: document.number.clone(),
                from: document.status.to_string(),
                to: status.to_string(),
            }
            .into());
        }

        let from = document.status;
        write_status(&mut tx, &mut document, status).await?;
        tx.commit().await?;

        info!(number = %document.number, from = %from, to = %status, "Document status changed");
        Ok(document)
    }

    /// Records an approver's verdict on a purchase requisition or purchase
    /// order and applies its status.
    ///
    /// ## Errors
    /// - `Validation`: not a purchase document, bad approver or comments
    /// - `NotFound`: unknown id
    /// - `Conflict`: the document is past the point of approval
    pub async fn approve(
        &self,
        id: &str,
        approver_id: &str,
        decision: ApprovalDecision,
        comments: Option<&str>,
    ) -> DbResult<Document> {
        validate_name("approver", approver_id, MAX_NAME_LENGTH)?;
        if let Some(comments) = comments {
            validate_text("comments", comments)?;
        }

        let mut tx = begin_write(&self.pool).await?;

        let mut document = fetch_document(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        if !document.kind.takes_approval() {
            return Err(ValidationError::invalid_format(
                "document",
                format!("{} ({}) takes no approval", document.number, document.kind),
            )
            .into());
        }
        let outcome = document
            .kind
            .approval_outcome(document.status, decision)
            .ok_or_else(|| locked(&document, "approve"))?;

        let record = ApprovalRecord {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            approver_id: approver_id.trim().to_string(),
            decision,
            comments: comments.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO approval_history (
                id, document_id, approver_id, decision, comments, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.id)
        .bind(&record.document_id)
        .bind(&record.approver_id)
        .bind(record.decision)
        .bind(&record.comments)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        if outcome != document.status {
            write_status(&mut tx, &mut document, outcome).await?;
        }
        tx.commit().await?;

        info!(
            number = %document.number,
            approver = %record.approver_id,
            decision = %decision,
            status = %document.status,
            "Approval recorded"
        );
        Ok(document)
    }

    /// Approval history of a document, oldest first.
    pub async fn approval_history(&self, id: &str) -> DbResult<Vec<ApprovalRecord>> {
        let records = sqlx::query_as::<_, ApprovalRecord>(&format!(
            "SELECT {} FROM approval_history WHERE document_id = ?1 ORDER BY created_at, rowid",
            APPROVAL_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Records delivered quantities on a sent purchase order.
    ///
    /// The order becomes FullyReceived once every line has its ordered
    /// quantity in, PartiallyReceived otherwise.
    ///
    /// ## Errors
    /// - `Validation`: not a purchase order, no receipts, negative quantity
    /// - `NotFound`: unknown order, or a line that isn't on it
    /// - `Conflict`: the order hasn't been sent, or is fully received
    pub async fn receive(&self, id: &str, receipts: &[Receipt]) -> DbResult<DocumentDetail> {
        if receipts.is_empty() {
            return Err(ValidationError::Required {
                field: "receipts".to_string(),
            }
            .into());
        }
        if receipts.iter().any(|r| r.received_quantity < 0) {
            return Err(ValidationError::Negative {
                field: "received_quantity".to_string(),
            }
            .into());
        }

        let mut tx = begin_write(&self.pool).await?;

        let mut document = fetch_document(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        if document.kind != DocumentKind::PurchaseOrder {
            return Err(ValidationError::invalid_format(
                "document",
                format!("{} is not a {}", document.number, DocumentKind::PurchaseOrder),
            )
            .into());
        }
        if !document.kind.accepts_receipts(document.status) {
            return Err(locked(&document, "receive"));
        }

        for receipt in receipts {
            let result = sqlx::query(
                "UPDATE line_items SET received_quantity = ?3 WHERE id = ?1 AND document_id = ?2",
            )
            .bind(&receipt.line_item_id)
            .bind(&document.id)
            .bind(receipt.received_quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Line item", receipt.line_item_id.as_str()));
            }
        }

        let items = fetch_items(&mut tx, &document.id).await?;
        let status = receipt_status(&items);
        write_status(&mut tx, &mut document, status).await?;
        tx.commit().await?;

        info!(number = %document.number, status = %status, lines = receipts.len(), "Receipt recorded");
        Ok(DocumentDetail { document, items })
    }

    /// Creates an invoice from a quotation and marks the quotation converted.
    ///
    /// Items, tax, discount, counterparty and job number carry over.
    pub async fn convert_quotation_to_invoice(
        &self,
        quotation_id: &str,
        created_by: &str,
    ) -> DbResult<DocumentDetail> {
        let source = self.conversion_source(quotation_id, DocumentKind::Quotation).await?;
        if matches!(source.status, DocumentStatus::Rejected | DocumentStatus::Expired) {
            return Err(locked(&source, "convert"));
        }
        self.convert(source, DocumentKind::Invoice, created_by).await
    }

    /// Creates a purchase order from a requisition and marks the
    /// requisition converted.
    pub async fn convert_requisition_to_order(
        &self,
        requisition_id: &str,
        created_by: &str,
    ) -> DbResult<DocumentDetail> {
        let source = self
            .conversion_source(requisition_id, DocumentKind::PurchaseRequisition)
            .await?;
        if matches!(source.status, DocumentStatus::Rejected | DocumentStatus::Cancelled) {
            return Err(locked(&source, "convert"));
        }
        self.convert(source, DocumentKind::PurchaseOrder, created_by).await
    }

    async fn conversion_source(&self, id: &str, expected: DocumentKind) -> DbResult<Document> {
        let source = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        if source.kind != expected {
            return Err(ValidationError::invalid_format(
                "document",
                format!("{} is not a {}", source.number, expected),
            )
            .into());
        }
        if source.status == DocumentStatus::Converted {
            return Err(CoreError::AlreadyConverted {
                number: source.number,
            }
            .into());
        }
        Ok(source)
    }

    async fn convert(
        &self,
        source: Document,
        target: DocumentKind,
        created_by: &str,
    ) -> DbResult<DocumentDetail> {
        let items = to_inputs(self.items(&source.id).await?);

        let new = NewDocument {
            kind: target,
            company_id: source.company_id.clone(),
            counterparty_id: source.counterparty_id.clone(),
            currency: source.currency.clone(),
            issue_date: None,
            tax_rate: source.tax_rate(),
            discount: source.discount()?,
            items,
            notes: source.notes.clone(),
            created_by: created_by.to_string(),
            job_number: source.job_number.clone(),
        };

        let detail = self.create_from(new, Some(&source)).await?;
        info!(
            from = %source.number,
            to = %detail.document.number,
            "Document converted"
        );
        Ok(detail)
    }

    /// Deletes a document, its items and its issued number.
    ///
    /// A job number pointing at the document has that reference cleared; the
    /// job number itself survives.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        let document = fetch_document(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        if document.kind.is_locked(document.status) {
            return Err(locked(&document, "delete"));
        }

        let cleared =
            identifier::clear_references_to(&mut tx, reference_field(document.kind), id).await?;
        identifier::delete_for_document(&mut tx, id).await?;

        sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(number = %document.number, cleared_references = cleared, "Document deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
