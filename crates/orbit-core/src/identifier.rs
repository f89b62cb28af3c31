//! # Identifier Module
//!
//! Display numbers for business documents and job numbers.
//!
//! ## Two Formats, Never Mixed
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  COMPACT  (invoices, quotations, purchase orders, requisitions)        │
//! │                                                                         │
//! │     INV 24 03 0007                                                      │
//! │     ─┬─ ─┬ ─┬ ──┬─                                                      │
//! │      │   │  │   └── sequence, zero-padded to 4 (wider if needed)        │
//! │      │   │  └────── month (01-12)                                       │
//! │      │   └───────── two-digit year (2000-2099)                          │
//! │      └───────────── tag: INV | QT | PO | PR                             │
//! │     counter key: (type, year, month), first sequence = 1               │
//! │                                                                         │
//! │  JOB  (job numbers)                                                     │
//! │                                                                         │
//! │     Q _ 2024 _ 0                                                        │
//! │     ┬   ─┬──   ┬                                                        │
//! │     │    │     └── sequence, unpadded                                   │
//! │     │    └──────── four-digit year                                      │
//! │     └───────────── tag: Q | W | M | S | INV                             │
//! │     counter key: (type, year), first sequence = 0                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Downstream systems parse these strings literally, so the caller always
//! names the format explicitly and [`format`]/[`parse`] reject a type that
//! belongs to the other format.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Minimum width of the compact sequence.
pub const COMPACT_SEQUENCE_WIDTH: usize = 4;

// =============================================================================
// Formats and Types
// =============================================================================

/// Rendering mode of a display number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum IdentifierFormat {
    /// `<TAG><YY><MM><seq:04>`
    Compact,
    /// `<TAG>_<YYYY>_<seq>`
    Job,
}

/// Job number categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum JobCategory {
    #[serde(rename = "Q")]
    Q,
    #[serde(rename = "W")]
    W,
    #[serde(rename = "M")]
    M,
    #[serde(rename = "S")]
    S,
    /// Job numbers issued automatically alongside invoices.
    #[serde(rename = "INV")]
    Inv,
}

impl JobCategory {
    pub const ALL: [JobCategory; 5] = [
        JobCategory::Q,
        JobCategory::W,
        JobCategory::M,
        JobCategory::S,
        JobCategory::Inv,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            JobCategory::Q => "Q",
            JobCategory::W => "W",
            JobCategory::M => "M",
            JobCategory::S => "S",
            JobCategory::Inv => "INV",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        JobCategory::ALL.into_iter().find(|c| c.tag() == tag)
    }
}

impl FromStr for JobCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobCategory::from_tag(s.trim())
            .ok_or_else(|| ValidationError::not_allowed("job type", &["Q", "W", "M", "S", "INV"]))
    }
}

/// A numbering series.
///
/// Stored as text: `INV`, `QT`, `PO`, `PR` for documents and `JOB-<tag>`
/// for job numbers, so an invoice series and the `INV` job series never
/// share a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DocumentType {
    Invoice,
    Quotation,
    PurchaseOrder,
    PurchaseRequisition,
    Job(JobCategory),
}

impl DocumentType {
    const COMPACT: [DocumentType; 4] = [
        DocumentType::Invoice,
        DocumentType::Quotation,
        DocumentType::PurchaseOrder,
        DocumentType::PurchaseRequisition,
    ];

    /// Tag printed at the start of the display number.
    pub fn tag(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "INV",
            DocumentType::Quotation => "QT",
            DocumentType::PurchaseOrder => "PO",
            DocumentType::PurchaseRequisition => "PR",
            DocumentType::Job(category) => category.tag(),
        }
    }

    /// Format this series is rendered in.
    pub fn format(&self) -> IdentifierFormat {
        match self {
            DocumentType::Job(_) => IdentifierFormat::Job,
            _ => IdentifierFormat::Compact,
        }
    }

    /// First sequence issued for a fresh key.
    pub fn starting_sequence(&self) -> i64 {
        match self {
            DocumentType::Job(_) => 0,
            _ => 1,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "INV",
            DocumentType::Quotation => "QT",
            DocumentType::PurchaseOrder => "PO",
            DocumentType::PurchaseRequisition => "PR",
            DocumentType::Job(JobCategory::Q) => "JOB-Q",
            DocumentType::Job(JobCategory::W) => "JOB-W",
            DocumentType::Job(JobCategory::M) => "JOB-M",
            DocumentType::Job(JobCategory::S) => "JOB-S",
            DocumentType::Job(JobCategory::Inv) => "JOB-INV",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(tag) = s.strip_prefix("JOB-") {
            return tag.parse().map(DocumentType::Job);
        }
        DocumentType::COMPACT
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("document type", s.to_string()))
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for DocumentType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Sequence Key
// =============================================================================

/// Scope of one counter: (type, year[, month]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceKey {
    pub document_type: DocumentType,
    pub year: i32,
    /// Present exactly when the series uses the compact format.
    pub month: Option<u32>,
}

impl SequenceKey {
    /// Builds a key, checking that year and month fit the series' format.
    pub fn new(document_type: DocumentType, year: i32, month: Option<u32>) -> ValidationResult<Self> {
        match document_type.format() {
            IdentifierFormat::Compact => {
                check_compact_year(year)?;
                let month = month.ok_or_else(|| ValidationError::Required {
                    field: "month".to_string(),
                })?;
                check_month(month)?;
            }
            IdentifierFormat::Job => {
                check_job_year(year)?;
                if month.is_some() {
                    return Err(ValidationError::invalid_format(
                        "month",
                        "job numbers are counted per year",
                    ));
                }
            }
        }
        Ok(SequenceKey {
            document_type,
            year,
            month,
        })
    }

    /// Key for a document created on `date`.
    pub fn for_date(document_type: DocumentType, date: NaiveDate) -> ValidationResult<Self> {
        let month = match document_type.format() {
            IdentifierFormat::Compact => Some(date.month()),
            IdentifierFormat::Job => None,
        };
        SequenceKey::new(document_type, date.year(), month)
    }

    /// Sequence that follows the highest one already issued.
    pub fn next_after(&self, current_max: Option<i64>) -> i64 {
        match current_max {
            Some(max) => max + 1,
            None => self.document_type.starting_sequence(),
        }
    }

    /// Renders the display number for `sequence` under this key.
    pub fn display(&self, sequence: i64) -> ValidationResult<String> {
        format(
            self.document_type.format(),
            self.document_type,
            self.year,
            self.month,
            sequence,
        )
    }
}

// =============================================================================
// Format / Parse
// =============================================================================

/// Everything recoverable from a display number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedIdentifier {
    pub document_type: DocumentType,
    pub year: i32,
    pub month: Option<u32>,
    pub sequence: i64,
}

/// Renders a display number.
///
/// ```rust
/// use orbit_core::identifier::{format, DocumentType, IdentifierFormat, JobCategory};
///
/// let inv = format(IdentifierFormat::Compact, DocumentType::Invoice, 2024, Some(3), 7).unwrap();
/// assert_eq!(inv, "INV24030007");
///
/// let job = format(IdentifierFormat::Job, DocumentType::Job(JobCategory::Q), 2024, None, 0).unwrap();
/// assert_eq!(job, "Q_2024_0");
/// ```
pub fn format(
    mode: IdentifierFormat,
    document_type: DocumentType,
    year: i32,
    month: Option<u32>,
    sequence: i64,
) -> ValidationResult<String> {
    if document_type.format() != mode {
        return Err(ValidationError::invalid_format(
            "document type",
            format!("{} is not rendered in {:?} format", document_type, mode),
        ));
    }
    if sequence < 0 {
        return Err(ValidationError::Negative {
            field: "sequence".to_string(),
        });
    }

    let key = SequenceKey::new(document_type, year, month)?;
    match mode {
        IdentifierFormat::Compact => Ok(format!(
            "{}{:02}{:02}{:0width$}",
            document_type.tag(),
            key.year % 100,
            key.month.unwrap_or_default(),
            sequence,
            width = COMPACT_SEQUENCE_WIDTH
        )),
        IdentifierFormat::Job => Ok(format!("{}_{}_{}", document_type.tag(), key.year, sequence)),
    }
}

/// Recovers (type, year, month, sequence) from a display number.
///
/// ```rust
/// use orbit_core::identifier::{parse, DocumentType, IdentifierFormat};
///
/// let parsed = parse(IdentifierFormat::Compact, "PO25120042").unwrap();
/// assert_eq!(parsed.document_type, DocumentType::PurchaseOrder);
/// assert_eq!((parsed.year, parsed.month, parsed.sequence), (2025, Some(12), 42));
/// ```
pub fn parse(mode: IdentifierFormat, text: &str) -> ValidationResult<ParsedIdentifier> {
    match mode {
        IdentifierFormat::Compact => parse_compact(text),
        IdentifierFormat::Job => parse_job(text),
    }
}

fn parse_compact(text: &str) -> ValidationResult<ParsedIdentifier> {
    let malformed = |reason: &str| ValidationError::invalid_format("display number", reason.to_string());

    let split = text
        .find(|c: char| !c.is_ascii_uppercase())
        .ok_or_else(|| malformed("missing date and sequence"))?;
    let (tag, rest) = text.split_at(split);

    let document_type = DocumentType::COMPACT
        .into_iter()
        .find(|t| t.tag() == tag)
        .ok_or_else(|| malformed("unknown compact tag"))?;

    if !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("expected digits after the tag"));
    }
    if rest.len() < 4 + COMPACT_SEQUENCE_WIDTH {
        return Err(malformed("too short"));
    }

    let (yy, rest) = rest.split_at(2);
    let (mm, seq) = rest.split_at(2);
    if seq.len() > COMPACT_SEQUENCE_WIDTH && seq.starts_with('0') {
        return Err(malformed("sequence is not canonical"));
    }

    let year = 2000 + parse_digits::<i32>(yy)?;
    let month = parse_digits::<u32>(mm)?;
    check_month(month)?;
    let sequence = parse_digits::<i64>(seq)?;

    Ok(ParsedIdentifier {
        document_type,
        year,
        month: Some(month),
        sequence,
    })
}

fn parse_job(text: &str) -> ValidationResult<ParsedIdentifier> {
    let malformed = |reason: &str| ValidationError::invalid_format("job number", reason.to_string());

    let mut parts = text.split('_');
    let (Some(tag), Some(year), Some(seq), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("expected <TYPE>_<YEAR>_<SEQUENCE>"));
    };

    let category = JobCategory::from_tag(tag).ok_or_else(|| malformed("unknown job tag"))?;
    if year.len() != 4 {
        return Err(malformed("year must have four digits"));
    }
    let year = parse_digits::<i32>(year)?;
    check_job_year(year)?;
    if seq.len() > 1 && seq.starts_with('0') {
        return Err(malformed("sequence is not canonical"));
    }
    let sequence = parse_digits::<i64>(seq)?;

    Ok(ParsedIdentifier {
        document_type: DocumentType::Job(category),
        year,
        month: None,
        sequence,
    })
}

/// Parses a run of ASCII digits (no sign, no whitespace).
fn parse_digits<T: FromStr>(s: &str) -> ValidationResult<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::invalid_format("number", format!("'{}' is not a number", s)));
    }
    s.parse::<T>()
        .map_err(|_| ValidationError::invalid_format("number", format!("'{}' is out of range", s)))
}

fn check_month(month: u32) -> ValidationResult<()> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        });
    }
    Ok(())
}

fn check_compact_year(year: i32) -> ValidationResult<()> {
    if !(2000..=2099).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 2000,
            max: 2099,
        });
    }
    Ok(())
}

fn check_job_year(year: i32) -> ValidationResult<()> {
    if !(1000..=9999).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 1000,
            max: 9999,
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
    fn test_compact_format() {
        let s = format(IdentifierFormat::Compact, DocumentType::Invoice, 2024, Some(3), 7).unwrap();
        assert_eq!(s, "INV24030007");

        let s = format(IdentifierFormat::Compact, DocumentType::Quotation, 2031, Some(11), 12345)
            .unwrap();
        assert_eq!(s, "QT311112345");
    }

    #[test]
    fn test_job_format() {
        let s = format(IdentifierFormat::Job, DocumentType::Job(JobCategory::W), 2025, None, 0).unwrap();
        assert_eq!(s, "W_2025_0");

        let s = format(IdentifierFormat::Job, DocumentType::Job(JobCategory::Inv), 2025, None, 41)
            .unwrap();
        assert_eq!(s, "INV_2025_41");
    }

    #[test]
    fn test_mode_must_match_type() {
        assert!(format(IdentifierFormat::Job, DocumentType::Invoice, 2024, None, 1).is_err());
        assert!(format(
            IdentifierFormat::Compact,
            DocumentType::Job(JobCategory::Q),
            2024,
            Some(1),
            1
        )
        .is_err());
        // A job number is not a compact number, even with a familiar tag
        assert!(parse(IdentifierFormat::Compact, "INV_2024_3").is_err());
        assert!(parse(IdentifierFormat::Job, "INV24030007").is_err());
    }

    #[test]
    fn test_round_trip_both_modes() {
        let compact_types = [
            DocumentType::Invoice,
            DocumentType::Quotation,
            DocumentType::PurchaseOrder,
            DocumentType::PurchaseRequisition,
        ];
        for t in compact_types {
            for (year, month, seq) in [(2000, 1, 1), (2024, 3, 7), (2099, 12, 9999), (2050, 6, 10000)] {
                let s = format(IdentifierFormat::Compact, t, year, Some(month), seq).unwrap();
                let p = parse(IdentifierFormat::Compact, &s).unwrap();
                assert_eq!(
                    p,
                    ParsedIdentifier {
                        document_type: t,
                        year,
                        month: Some(month),
                        sequence: seq
                    }
                );
            }
        }

        for category in JobCategory::ALL {
            let t = DocumentType::Job(category);
            for (year, seq) in [(2024, 0), (1999, 10), (9999, 123456)] {
                let s = format(IdentifierFormat::Job, t, year, None, seq).unwrap();
                let p = parse(IdentifierFormat::Job, &s).unwrap();
                assert_eq!((p.document_type, p.year, p.month, p.sequence), (t, year, None, seq));
            }
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "INV", "INV2403", "INV240300", "XX24030001", "INV24130001", "INV2403A001", "INV24030000001"] {
            assert!(parse(IdentifierFormat::Compact, bad).is_err(), "{bad}");
        }
        for bad in ["Q_2024", "Q_24_1", "X_2024_1", "Q_2024_01", "Q_2024_-1", "Q_2024_1_2"] {
            assert!(parse(IdentifierFormat::Job, bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_out_of_range_inputs() {
        assert!(format(IdentifierFormat::Compact, DocumentType::Invoice, 1999, Some(1), 1).is_err());
        assert!(format(IdentifierFormat::Compact, DocumentType::Invoice, 2024, Some(13), 1).is_err());
        assert!(format(IdentifierFormat::Compact, DocumentType::Invoice, 2024, None, 1).is_err());
        assert!(format(IdentifierFormat::Compact, DocumentType::Invoice, 2024, Some(1), -1).is_err());
    }

    #[test]
    fn test_sequence_key_for_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let key = SequenceKey::for_date(DocumentType::Invoice, date).unwrap();
        assert_eq!(key.month, Some(3));
        assert_eq!(key.next_after(None), 1);
        assert_eq!(key.next_after(Some(6)), 7);
        assert_eq!(key.display(7).unwrap(), "INV24030007");

        let key = SequenceKey::for_date(DocumentType::Job(JobCategory::S), date).unwrap();
        assert_eq!(key.month, None);
        assert_eq!(key.next_after(None), 0);
        assert_eq!(key.display(0).unwrap(), "S_2024_0");
    }

    #[test]
    fn test_year_rollover_changes_key() {
        let dec = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let t = DocumentType::Job(JobCategory::Q);
        assert_ne!(
            SequenceKey::for_date(t, dec).unwrap(),
            SequenceKey::for_date(t, jan).unwrap()
        );
    }

    #[test]
    fn test_document_type_storage_round_trip() {
        let all = DocumentType::COMPACT
            .into_iter()
            .chain(JobCategory::ALL.into_iter().map(DocumentType::Job));
        for t in all {
            assert_eq!(t.as_str().parse::<DocumentType>().unwrap(), t);
        }
        assert!("JOB-X".parse::<DocumentType>().is_err());
        assert_ne!(DocumentType::Invoice.as_str(), DocumentType::Job(JobCategory::Inv).as_str());
    }
}
