//! # Totals Module
//!
//! Derives line totals and document totals from line items, a VAT rate and
//! a discount.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  items ──► line total = qty × unit price   (per item, always fresh)    │
//! │              │                                                          │
//! │              ▼                                                          │
//! │           subtotal = Σ line totals                                      │
//! │              │                                                          │
//! │              ├──► tax      = subtotal × rate      (half-up to cents)    │
//! │              │                                                          │
//! │              ├──► discount = subtotal × pct       (percentage)          │
//! │              │             | fixed amount        (fixed)               │
//! │              │      clamped to subtotal + tax                           │
//! │              ▼                                                          │
//! │           grand total = subtotal + tax − discount   (never negative)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals supplied by a caller are never trusted: repositories call
//! [`compute_totals`] on every create and on every update that touches
//! items, the rate or the discount.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::TaxRate;
use crate::validation::ValidationResult;

// =============================================================================
// Discount
// =============================================================================

/// How a document's discount value is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DiscountMode {
    #[default]
    Percentage,
    Fixed,
}

impl fmt::Display for DiscountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountMode::Percentage => f.write_str("percentage"),
            DiscountMode::Fixed => f.write_str("fixed"),
        }
    }
}

impl FromStr for DiscountMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "percentage" => Ok(DiscountMode::Percentage),
            "fixed" => Ok(DiscountMode::Fixed),
            _ => Err(ValidationError::not_allowed(
                "discount type",
                &["percentage", "fixed"],
            )),
        }
    }
}

/// A validated discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Discount {
    /// Share of the subtotal, in basis points (0..=10000).
    Percentage { bps: u32 },
    /// Flat amount.
    Fixed { amount: Money },
}

impl Discount {
    /// Builds a discount from its stored parts: basis points for
    /// percentage mode, cents for fixed mode.
    pub fn new(mode: DiscountMode, value: i64) -> ValidationResult<Self> {
        if value < 0 {
            return Err(ValidationError::Negative {
                field: "discount".to_string(),
            });
        }
        match mode {
            DiscountMode::Percentage => {
                if value > TaxRate::MAX_BPS as i64 {
                    return Err(ValidationError::OutOfRange {
                        field: "discount percentage".to_string(),
                        min: 0,
                        max: 100,
                    });
                }
                Ok(Discount::Percentage { bps: value as u32 })
            }
            DiscountMode::Fixed => Ok(Discount::Fixed {
                amount: Money::from_cents(value),
            }),
        }
    }

    /// Whole-number percentage discount.
    pub fn percent(pct: u32) -> ValidationResult<Self> {
        Discount::new(DiscountMode::Percentage, pct as i64 * 100)
    }

    /// Flat discount.
    pub fn fixed(amount: Money) -> ValidationResult<Self> {
        Discount::new(DiscountMode::Fixed, amount.cents())
    }

    #[inline]
    pub const fn none() -> Self {
        Discount::Percentage { bps: 0 }
    }

    pub fn mode(&self) -> DiscountMode {
        match self {
            Discount::Percentage { .. } => DiscountMode::Percentage,
            Discount::Fixed { .. } => DiscountMode::Fixed,
        }
    }

    /// Value as stored next to [`Discount::mode`].
    pub fn raw_value(&self) -> i64 {
        match self {
            Discount::Percentage { bps } => *bps as i64,
            Discount::Fixed { amount } => amount.cents(),
        }
    }

    /// Unclamped discount amount for a subtotal.
    fn amount_for(&self, subtotal: Money) -> Money {
        match self {
            Discount::Percentage { bps } => subtotal.apply_bps(*bps),
            Discount::Fixed { amount } => *amount,
        }
    }
}

impl Default for Discount {
    fn default() -> Self {
        Discount::none()
    }
}

// =============================================================================
// Line Items
// =============================================================================

/// Caller-supplied line item. The total is always derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItemInput {
    pub description: String,
    pub unit: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub account_id: Option<String>,
}

impl LineItemInput {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        LineItemInput {
            description: description.into(),
            unit: None,
            quantity,
            unit_price_cents,
            account_id: None,
        }
    }
}

/// quantity × unit price.
pub fn line_total(quantity: i64, unit_price: Money) -> ValidationResult<Money> {
    if quantity < 0 {
        return Err(ValidationError::Negative {
            field: "quantity".to_string(),
        });
    }
    if unit_price.is_negative() {
        return Err(ValidationError::Negative {
            field: "unit price".to_string(),
        });
    }
    unit_price
        .multiply_quantity(quantity)
        .ok_or_else(|| overflow("line total"))
}

fn overflow(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

// =============================================================================
// Document Totals
// =============================================================================

/// Derived money fields of a document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub grand_total: Money,
    /// Line totals in input order.
    #[serde(skip)]
    #[ts(skip)]
    pub line_totals: Vec<Money>,
}

/// Computes totals for a list of items.
///
/// ```rust
/// use orbit_core::money::Money;
/// use orbit_core::totals::{compute_totals, Discount, LineItemInput};
/// use orbit_core::types::TaxRate;
///
/// let items = vec![
///     LineItemInput::new("Widget", 2, 1000),
///     LineItemInput::new("Bolt", 1, 500),
/// ];
/// let discount = Discount::fixed(Money::from_cents(300)).unwrap();
/// let totals = compute_totals(&items, TaxRate::from_bps(1000), discount).unwrap();
///
/// assert_eq!(totals.subtotal.cents(), 2500);
/// assert_eq!(totals.tax.cents(), 250);
/// assert_eq!(totals.discount.cents(), 300);
/// assert_eq!(totals.grand_total.cents(), 2450);
/// ```
pub fn compute_totals(
    items: &[LineItemInput],
    tax_rate: TaxRate,
    discount: Discount,
) -> ValidationResult<DocumentTotals> {
    let mut line_totals = Vec::with_capacity(items.len());
    let mut subtotal = Money::zero();

    for item in items {
        let total = line_total(item.quantity, Money::from_cents(item.unit_price_cents))?;
        subtotal = Money::from_cents(
            subtotal
                .cents()
                .checked_add(total.cents())
                .ok_or_else(|| overflow("subtotal"))?,
        );
        line_totals.push(total);
    }

    let tax = subtotal.calculate_tax(tax_rate);
    let gross = Money::from_cents(
        subtotal
            .cents()
            .checked_add(tax.cents())
            .ok_or_else(|| overflow("grand total"))?,
    );
    let discount = discount.amount_for(subtotal).min(gross);

    Ok(DocumentTotals {
        subtotal,
        tax,
        discount,
        grand_total: gross - discount,
        line_totals,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<LineItemInput> {
        vec![
            LineItemInput::new("Cable", 2, 1000),
            LineItemInput::new("Clip", 1, 500),
        ]
    }

    #[test]
    fn test_fixed_discount_example() {
        let totals = compute_totals(
            &items(),
            TaxRate::from_percent(10).unwrap(),
            Discount::fixed(Money::from_cents(300)).unwrap(),
        )
        .unwrap();

        assert_eq!(totals.subtotal, Money::from_cents(2500));
        assert_eq!(totals.tax, Money::from_cents(250));
        assert_eq!(totals.discount, Money::from_cents(300));
        assert_eq!(totals.grand_total, Money::from_cents(2450));
        assert_eq!(
            totals.line_totals,
            vec![Money::from_cents(2000), Money::from_cents(500)]
        );
    }

    #[test]
    fn test_percentage_discount_on_subtotal() {
        let items = vec![LineItemInput::new("Service", 1, 10_000)];
        let totals = compute_totals(&items, TaxRate::zero(), Discount::percent(10).unwrap()).unwrap();
        assert_eq!(totals.discount, Money::from_cents(1000));
        assert_eq!(totals.grand_total, Money::from_cents(9000));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let rate = TaxRate::from_bps(825);
        let discount = Discount::percent(5).unwrap();
        let first = compute_totals(&items(), rate, discount).unwrap();
        let second = compute_totals(&items(), rate, discount).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_discount_clamped() {
        let totals = compute_totals(
            &items(),
            TaxRate::from_percent(10).unwrap(),
            Discount::fixed(Money::from_cents(1_000_000)).unwrap(),
        )
        .unwrap();
        assert_eq!(totals.discount, Money::from_cents(2750));
        assert_eq!(totals.grand_total, Money::zero());
    }

    #[test]
    fn test_empty_items() {
        let totals = compute_totals(&[], TaxRate::from_bps(1500), Discount::none()).unwrap();
        assert_eq!(totals, DocumentTotals::default());
    }

    #[test]
    fn test_rejects_negative_input() {
        let bad_qty = vec![LineItemInput::new("x", -1, 100)];
        assert!(compute_totals(&bad_qty, TaxRate::zero(), Discount::none()).is_err());

        let bad_price = vec![LineItemInput::new("x", 1, -100)];
        assert!(compute_totals(&bad_price, TaxRate::zero(), Discount::none()).is_err());

        assert!(Discount::new(DiscountMode::Fixed, -1).is_err());
        assert!(Discount::new(DiscountMode::Percentage, 10_001).is_err());
    }

    #[test]
    fn test_overflow_is_validation_error() {
        let items = vec![LineItemInput::new("x", 2, i64::MAX / 2 + 1)];
        assert!(compute_totals(&items, TaxRate::zero(), Discount::none()).is_err());
    }

    #[test]
    fn test_discount_mode_parse() {
        assert_eq!("fixed".parse::<DiscountMode>().unwrap(), DiscountMode::Fixed);
        assert_eq!(
            "percentage".parse::<DiscountMode>().unwrap(),
            DiscountMode::Percentage
        );
        assert!("bogus".parse::<DiscountMode>().is_err());
    }

    #[test]
    fn test_discount_round_trips_through_storage() {
        let d = Discount::percent(12).unwrap();
        assert_eq!(Discount::new(d.mode(), d.raw_value()).unwrap(), d);
    }

    #[test]
    fn test_discount_json_shape() {
        let fixed = Discount::fixed(Money::from_cents(300)).unwrap();
        let json = serde_json::to_value(fixed).unwrap();
        assert_eq!(json, serde_json::json!({ "mode": "fixed", "amount": 300 }));

        let parsed: Discount =
            serde_json::from_str(r#"{ "mode": "percentage", "bps": 1000 }"#).unwrap();
        assert_eq!(parsed, Discount::percent(10).unwrap());
    }
}
