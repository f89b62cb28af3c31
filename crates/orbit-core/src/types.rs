//! # Domain Types
//!
//! Core domain types used throughout Orbit ERP.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐      │
//! │  │ IdentifierRecord │  │     Account      │  │     Document     │      │
//! │  │ ──────────────── │  │ ──────────────── │  │ ──────────────── │      │
//! │  │ display_number   │  │ code "1.2.3"     │  │ number INV...    │      │
//! │  │ type/year/seq    │  │ level 1..4       │  │ kind / status    │      │
//! │  │ *_ref links      │  │ parent_id (arena)│  │ totals (derived) │      │
//! │  └──────────────────┘  └──────────────────┘  └────────┬─────────┘      │
//! │                                                        │ 1..n           │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌────────▼─────────┐      │
//! │  │     TaxRate      │  │   AccountType    │  │     LineItem     │      │
//! │  │  bps (u32)       │  │ Asset..Expense   │  │ qty × unit price │      │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (display number, account code) - human-readable, unique

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::identifier::DocumentType;
use crate::money::Money;
use crate::totals::{Discount, DiscountMode};

// =============================================================================
// Tax Rate
// =============================================================================

/// VAT rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% VAT, 1500 bps = 15% VAT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Highest accepted rate (100%).
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a whole-number percentage, rejecting values
    /// above 100%.
    pub fn from_percent(pct: u32) -> Result<Self, ValidationError> {
        let bps = pct.checked_mul(100).unwrap_or(u32::MAX);
        Self::checked(bps)
    }

    /// Creates a tax rate from basis points, rejecting values above 100%.
    pub fn checked(bps: u32) -> Result<Self, ValidationError> {
        if bps > Self::MAX_BPS {
            return Err(ValidationError::OutOfRange {
                field: "vat_percentage".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(TaxRate(bps))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Chart of Accounts
// =============================================================================

/// Top-level classification of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "PascalCase")]
#[ts(export)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "Asset",
            AccountType::Liability => "Liability",
            AccountType::Equity => "Equity",
            AccountType::Revenue => "Revenue",
            AccountType::Expense => "Expense",
        }
    }
}

impl FromStr for AccountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ValidationError::not_allowed(
                    "account type",
                    &["Asset", "Liability", "Equity", "Revenue", "Expense"],
                )
            })
    }
}

/// Whether an account (or identifier record) is in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

/// A node in a company's chart of accounts.
///
/// Parents are referenced by id only; children are found by querying
/// `parent_id`, never stored on the parent.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Account {
    pub id: String,
    pub company_id: String,
    /// Dotted-segment code, unique per company ("1", "1.2", "1.2.7").
    pub code: String,
    pub name: String,
    /// Depth in the tree, 1..=4.
    pub level: u8,
    pub account_type: AccountType,
    pub parent_id: Option<String>,
    /// Set once the first child is attached; never cleared automatically.
    pub is_parent: bool,
    pub status: RecordStatus,
    pub description: Option<String>,
    pub balance_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

// =============================================================================
// Identifier Records
// =============================================================================

/// Cross-reference slots on an identifier record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReferenceField {
    Quotation,
    Invoice,
    Company,
    Procurement,
    FixedAsset,
}

impl ReferenceField {
    /// Column holding this reference in the `identifiers` table.
    pub fn column(&self) -> &'static str {
        match self {
            ReferenceField::Quotation => "quotation_ref",
            ReferenceField::Invoice => "invoice_ref",
            ReferenceField::Company => "company_ref",
            ReferenceField::Procurement => "procurement_ref",
            ReferenceField::FixedAsset => "fixed_asset_ref",
        }
    }
}

impl FromStr for ReferenceField {
    type Err = ValidationError;

    /// Accepts the column names, including the legacy `fixedAsset_ref`
    /// spelling still sent by older clients.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quotation_ref" => Ok(ReferenceField::Quotation),
            "invoice_ref" => Ok(ReferenceField::Invoice),
            "company_ref" => Ok(ReferenceField::Company),
            "procurement_ref" => Ok(ReferenceField::Procurement),
            "fixed_asset_ref" | "fixedAsset_ref" => Ok(ReferenceField::FixedAsset),
            _ => Err(ValidationError::not_allowed(
                "reference field",
                &[
                    "quotation_ref",
                    "invoice_ref",
                    "company_ref",
                    "procurement_ref",
                    "fixed_asset_ref",
                ],
            )),
        }
    }
}

/// One issued display number.
///
/// Number, type, year, month and sequence are frozen at creation; only the
/// reference slots, description and status change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct IdentifierRecord {
    pub id: String,
    pub display_number: String,
    #[ts(as = "String")]
    pub document_type: DocumentType,
    pub year: i32,
    pub month: Option<u32>,
    pub sequence: i64,
    pub description: Option<String>,
    pub status: RecordStatus,
    pub quotation_ref: Option<String>,
    pub invoice_ref: Option<String>,
    pub company_ref: Option<String>,
    pub procurement_ref: Option<String>,
    pub fixed_asset_ref: Option<String>,
    /// The business document this number names, if any.
    pub document_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl IdentifierRecord {
    /// Returns the value of a reference slot.
    pub fn reference(&self, field: ReferenceField) -> Option<&str> {
        match field {
            ReferenceField::Quotation => self.quotation_ref.as_deref(),
            ReferenceField::Invoice => self.invoice_ref.as_deref(),
            ReferenceField::Company => self.company_ref.as_deref(),
            ReferenceField::Procurement => self.procurement_ref.as_deref(),
            ReferenceField::FixedAsset => self.fixed_asset_ref.as_deref(),
        }
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Line-item bearing business documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DocumentKind {
    Invoice,
    Quotation,
    PurchaseOrder,
    PurchaseRequisition,
}

impl DocumentKind {
    /// Numbering series used for this kind of document.
    pub fn document_type(&self) -> DocumentType {
        match self {
            DocumentKind::Invoice => DocumentType::Invoice,
            DocumentKind::Quotation => DocumentType::Quotation,
            DocumentKind::PurchaseOrder => DocumentType::PurchaseOrder,
            DocumentKind::PurchaseRequisition => DocumentType::PurchaseRequisition,
        }
    }

    /// Statuses a document of this kind may take.
    pub fn allowed_statuses(&self) -> &'static [DocumentStatus] {
        use DocumentStatus::*;
        match self {
            DocumentKind::Invoice => &[Draft, Sent, Cancelled],
            DocumentKind::Quotation => &[Draft, Sent, Accepted, Rejected, Expired, Converted],
            DocumentKind::PurchaseOrder => {
                &[Draft, Sent, PartiallyReceived, FullyReceived, Cancelled]
            }
            DocumentKind::PurchaseRequisition => {
                &[Draft, Submitted, Approved, Rejected, Converted, Cancelled]
            }
        }
    }

    /// Whether a document of this kind in `status` refuses edits and deletes.
    ///
    /// ```text
    /// PurchaseOrder        Sent | PartiallyReceived | FullyReceived → locked
    /// PurchaseRequisition  Approved | Converted                     → locked
    /// Invoice, Quotation   never locked
    /// ```
    pub fn is_locked(&self, status: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match self {
            DocumentKind::PurchaseOrder => {
                matches!(status, Sent | PartiallyReceived | FullyReceived)
            }
            DocumentKind::PurchaseRequisition => matches!(status, Approved | Converted),
            DocumentKind::Invoice | DocumentKind::Quotation => false,
        }
    }

    /// Whether `set_status` may move a document of this kind from `from` to
    /// `to`.
    ///
    /// Converted, receiving statuses, approved/rejected requisitions and sent
    /// purchase orders are only reached through conversion, receiving and
    /// approval.
    ///
    /// ```text
    /// Invoice              Draft → Sent;  Draft | Sent → Cancelled
    /// Quotation            Draft → Sent;  Draft | Sent → Accepted | Rejected | Expired
    /// PurchaseOrder        Draft → Cancelled
    /// PurchaseRequisition  Draft ⇄ Submitted;  Draft | Submitted → Cancelled
    /// ```
    pub fn allows_transition(&self, from: DocumentStatus, to: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match self {
            DocumentKind::Invoice => {
                matches!((from, to), (Draft, Sent) | (Draft | Sent, Cancelled))
            }
            DocumentKind::Quotation => matches!(
                (from, to),
                (Draft, Sent) | (Draft | Sent, Accepted | Rejected | Expired)
            ),
            DocumentKind::PurchaseOrder => matches!((from, to), (Draft, Cancelled)),
            DocumentKind::PurchaseRequisition => matches!(
                (from, to),
                (Draft, Submitted) | (Submitted, Draft) | (Draft | Submitted, Cancelled)
            ),
        }
    }

    /// Whether documents of this kind go through approval at all.
    pub fn takes_approval(&self) -> bool {
        matches!(
            self,
            DocumentKind::PurchaseOrder | DocumentKind::PurchaseRequisition
        )
    }

    /// Status after an approval decision, or `None` when a document of this
    /// kind in `from` can't take one.
    ///
    /// ```text
    /// PurchaseRequisition  Draft | Submitted   Approved → Approved   Rejected → Rejected
    /// PurchaseOrder        Draft               Approved → Sent       Rejected → Draft
    /// ```
    pub fn approval_outcome(
        &self,
        from: DocumentStatus,
        decision: ApprovalDecision,
    ) -> Option<DocumentStatus> {
        use DocumentStatus::*;
        match (self, from, decision) {
            (DocumentKind::PurchaseRequisition, Draft | Submitted, ApprovalDecision::Approved) => {
                Some(Approved)
            }
            (DocumentKind::PurchaseRequisition, Draft | Submitted, ApprovalDecision::Rejected) => {
                Some(Rejected)
            }
            (DocumentKind::PurchaseOrder, Draft, ApprovalDecision::Approved) => Some(Sent),
            (DocumentKind::PurchaseOrder, Draft, ApprovalDecision::Rejected) => Some(Draft),
            _ => None,
        }
    }

    /// Whether a document of this kind in `status` can record received
    /// quantities.
    pub fn accepts_receipts(&self, status: DocumentStatus) -> bool {
        *self == DocumentKind::PurchaseOrder
            && matches!(
                status,
                DocumentStatus::Sent | DocumentStatus::PartiallyReceived
            )
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quotation => "quotation",
            DocumentKind::PurchaseOrder => "purchase order",
            DocumentKind::PurchaseRequisition => "purchase requisition",
        };
        f.write_str(s)
    }
}

/// Lifecycle status shared by all document kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DocumentStatus {
    #[default]
    Draft,
    Sent,
    Submitted,
    Accepted,
    Approved,
    Rejected,
    Expired,
    PartiallyReceived,
    FullyReceived,
    Converted,
    Cancelled,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Sent => "sent",
            DocumentStatus::Submitted => "submitted",
            DocumentStatus::Accepted => "accepted",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Expired => "expired",
            DocumentStatus::PartiallyReceived => "partially_received",
            DocumentStatus::FullyReceived => "fully_received",
            DocumentStatus::Converted => "converted",
            DocumentStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Verdict recorded by an approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalDecision::Approved => f.write_str("approved"),
            ApprovalDecision::Rejected => f.write_str("rejected"),
        }
    }
}

/// One entry of a purchase document's approval history. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ApprovalRecord {
    pub id: String,
    pub document_id: String,
    pub approver_id: String,
    pub decision: ApprovalDecision,
    pub comments: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An invoice, quotation, purchase order or purchase requisition.
///
/// The `*_cents` totals are derived by [`crate::totals::compute_totals`]
/// on every save and are never taken from caller input.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Document {
    pub id: String,
    pub kind: DocumentKind,
    /// Display number, e.g. "INV24030007".
    pub number: String,
    pub company_id: String,
    /// Contact (sales documents) or vendor (purchase documents).
    pub counterparty_id: Option<String>,
    pub currency: String,
    /// Date the number was issued under; picks its year and month.
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    pub tax_rate_bps: u32,
    pub discount_mode: DiscountMode,
    /// Basis points for percentage discounts, cents for fixed ones.
    pub discount_value: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub grand_total_cents: i64,
    pub status: DocumentStatus,
    /// Display number of the linked job number.
    pub job_number: Option<String>,
    /// Quotation an invoice was converted from, or requisition behind a PO.
    pub source_document_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }

    /// Rebuilds the discount from its stored parts.
    pub fn discount(&self) -> Result<Discount, ValidationError> {
        Discount::new(self.discount_mode, self.discount_value)
    }
}

/// One row of a document.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LineItem {
    pub id: String,
    pub document_id: String,
    /// Zero-based position within the document.
    pub position: i64,
    pub description: String,
    /// Unit of measure (purchase documents).
    pub unit: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// quantity × unit price, always recomputed.
    pub total_cents: i64,
    /// Chart-of-accounts node charged by this line (purchase documents).
    pub account_id: Option<String>,
    /// Quantity delivered so far (purchase orders). May exceed `quantity`.
    pub received_quantity: i64,
}

impl LineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// Receiving status of a purchase order: fully received once every line has
/// at least its ordered quantity in.
pub fn receipt_status(items: &[LineItem]) -> DocumentStatus {
    if items.iter().all(|item| item.received_quantity >= item.quantity) {
        DocumentStatus::FullyReceived
    } else {
        DocumentStatus::PartiallyReceived
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_bounds() {
        assert_eq!(TaxRate::from_percent(10).unwrap().bps(), 1000);
        assert!(TaxRate::from_percent(100).is_ok());
        assert!(TaxRate::from_percent(101).is_err());
        assert!(TaxRate::checked(10_001).is_err());
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("asset".parse::<AccountType>().unwrap(), AccountType::Asset);
        assert_eq!(
            "Expense".parse::<AccountType>().unwrap(),
            AccountType::Expense
        );
        assert!("Income".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_reference_field_parse() {
        assert_eq!(
            "invoice_ref".parse::<ReferenceField>().unwrap(),
            ReferenceField::Invoice
        );
        assert_eq!(
            "fixedAsset_ref".parse::<ReferenceField>().unwrap(),
            ReferenceField::FixedAsset
        );
        assert!("owner_ref".parse::<ReferenceField>().is_err());
    }

    #[test]
    fn test_lock_rules() {
        assert!(DocumentKind::PurchaseOrder.is_locked(DocumentStatus::Sent));
        assert!(!DocumentKind::PurchaseOrder.is_locked(DocumentStatus::Draft));
        assert!(DocumentKind::PurchaseRequisition.is_locked(DocumentStatus::Converted));
        assert!(!DocumentKind::Invoice.is_locked(DocumentStatus::Sent));
    }

    #[test]
    fn test_manual_transitions() {
        use DocumentStatus::*;

        assert!(DocumentKind::Invoice.allows_transition(Draft, Sent));
        assert!(!DocumentKind::Invoice.allows_transition(Sent, Draft));
        assert!(DocumentKind::Quotation.allows_transition(Sent, Accepted));
        assert!(!DocumentKind::Quotation.allows_transition(Rejected, Accepted));

        // Reached only through conversion, approval or receiving.
        for kind in [DocumentKind::Quotation, DocumentKind::PurchaseRequisition] {
            assert!(!kind.allows_transition(Draft, Converted));
            assert!(!kind.allows_transition(Converted, Draft));
        }
        assert!(!DocumentKind::PurchaseRequisition.allows_transition(Submitted, Approved));
        assert!(!DocumentKind::PurchaseRequisition.allows_transition(Approved, Draft));
        assert!(!DocumentKind::PurchaseOrder.allows_transition(Draft, Sent));
        assert!(!DocumentKind::PurchaseOrder.allows_transition(Sent, Draft));
        assert!(!DocumentKind::PurchaseOrder.allows_transition(Sent, FullyReceived));
        assert!(DocumentKind::PurchaseOrder.allows_transition(Draft, Cancelled));
        assert!(!DocumentKind::PurchaseOrder.allows_transition(Sent, Cancelled));
    }

    #[test]
    fn test_approval_outcomes() {
        use DocumentStatus::*;
        let pr = DocumentKind::PurchaseRequisition;
        let po = DocumentKind::PurchaseOrder;

        assert_eq!(pr.approval_outcome(Submitted, ApprovalDecision::Approved), Some(Approved));
        assert_eq!(pr.approval_outcome(Draft, ApprovalDecision::Rejected), Some(Rejected));
        assert_eq!(pr.approval_outcome(Converted, ApprovalDecision::Approved), None);
        assert_eq!(po.approval_outcome(Draft, ApprovalDecision::Approved), Some(Sent));
        assert_eq!(po.approval_outcome(Draft, ApprovalDecision::Rejected), Some(Draft));
        assert_eq!(po.approval_outcome(Sent, ApprovalDecision::Approved), None);
        assert!(!DocumentKind::Invoice.takes_approval());
    }

    #[test]
    fn test_receipt_status() {
        let line = |quantity, received_quantity| LineItem {
            id: "line".to_string(),
            document_id: "po".to_string(),
            position: 0,
            description: "Cable".to_string(),
            unit: None,
            quantity,
            unit_price_cents: 100,
            total_cents: quantity * 100,
            account_id: None,
            received_quantity,
        };

        assert_eq!(
            receipt_status(&[line(10, 4), line(2, 2)]),
            DocumentStatus::PartiallyReceived
        );
        assert_eq!(
            receipt_status(&[line(10, 12), line(2, 2), line(0, 0)]),
            DocumentStatus::FullyReceived
        );
        assert!(DocumentKind::PurchaseOrder.accepts_receipts(DocumentStatus::Sent));
        assert!(!DocumentKind::PurchaseOrder.accepts_receipts(DocumentStatus::Draft));
        assert!(!DocumentKind::PurchaseOrder.accepts_receipts(DocumentStatus::FullyReceived));
    }

    #[test]
    fn test_allowed_statuses() {
        assert!(DocumentKind::Quotation
            .allowed_statuses()
            .contains(&DocumentStatus::Converted));
        assert!(!DocumentKind::Invoice
            .allowed_statuses()
            .contains(&DocumentStatus::Approved));
    }
}
