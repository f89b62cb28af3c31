//! # Account Code Module
//!
//! Dotted-segment codes for the chart of accounts and the allocator that
//! hands out the next one.
//!
//! ## Code Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Level 1   "1"          Assets                                         │
//! │  Level 2   "1.2"        └── Current Assets                             │
//! │  Level 3   "1.2.10"         └── Bank Accounts                          │
//! │  Level 4   "1.2.10.3"           └── Operating Account                  │
//! │                                                                         │
//! │  • segments are base-10 integers ≥ 1, never zero-padded                │
//! │  • level == number of segments, at most 4                              │
//! │  • next code = max(existing sibling suffix) + 1, gaps are not reused   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Zero padding is rejected outright: "1.02" and "1.2" would otherwise
//! compare differently as strings and as numbers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::Account;
use crate::validation::ValidationResult;

/// Deepest level of the chart of accounts.
pub const MAX_ACCOUNT_LEVEL: u8 = 4;

// =============================================================================
// Account Code
// =============================================================================

/// A validated account code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(try_from = "String", into = "String")]
#[ts(export, type = "string")]
pub struct AccountCode(String);

impl AccountCode {
    /// Parses and validates a code.
    ///
    /// ```rust
    /// use orbit_core::account::AccountCode;
    ///
    /// let code = AccountCode::parse("3.1.12").unwrap();
    /// assert_eq!(code.level(), 3);
    /// assert_eq!(code.parent().unwrap().as_str(), "3.1");
    ///
    /// assert!(AccountCode::parse("3.01").is_err());
    /// assert!(AccountCode::parse("1.1.1.1.1").is_err());
    /// ```
    pub fn parse(code: &str) -> ValidationResult<Self> {
        let mut depth = 0usize;
        for segment in code.split('.') {
            parse_segment(segment).ok_or_else(|| {
                ValidationError::invalid_format(
                    "account code",
                    format!("'{}' is not a dotted sequence of positive integers", code),
                )
            })?;
            depth += 1;
        }

        if depth > MAX_ACCOUNT_LEVEL as usize {
            return Err(ValidationError::OutOfRange {
                field: "account level".to_string(),
                min: 1,
                max: MAX_ACCOUNT_LEVEL as i64,
            });
        }

        Ok(AccountCode(code.to_string()))
    }

    /// Level-1 code `n`.
    pub fn root(n: u32) -> ValidationResult<Self> {
        if n == 0 {
            return Err(ValidationError::OutOfRange {
                field: "account code".to_string(),
                min: 1,
                max: u32::MAX as i64,
            });
        }
        Ok(AccountCode(n.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of segments.
    pub fn level(&self) -> u8 {
        self.0.split('.').count() as u8
    }

    /// Segment values, most significant first.
    pub fn segments(&self) -> Vec<u32> {
        self.0.split('.').filter_map(parse_segment).collect()
    }

    /// Code of the parent node, `None` at level 1.
    pub fn parent(&self) -> Option<AccountCode> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| AccountCode(parent.to_string()))
    }

    /// Child code `<self>.<k>`.
    pub fn child(&self, k: u32) -> ValidationResult<AccountCode> {
        if self.level() >= MAX_ACCOUNT_LEVEL {
            return Err(ValidationError::OutOfRange {
                field: "account level".to_string(),
                min: 1,
                max: MAX_ACCOUNT_LEVEL as i64,
            });
        }
        if k == 0 {
            return Err(ValidationError::invalid_format(
                "account code",
                "segments start at 1",
            ));
        }
        Ok(AccountCode(format!("{}.{}", self.0, k)))
    }

    /// Suffix `k` if `candidate` is exactly `<self>.<k>`.
    pub fn child_suffix(&self, candidate: &str) -> Option<u32> {
        candidate
            .strip_prefix(self.0.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(parse_segment)
    }
}

impl fmt::Display for AccountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccountCode::parse(&value)
    }
}

impl From<AccountCode> for String {
    fn from(value: AccountCode) -> Self {
        value.0
    }
}

/// Canonical positive base-10 integer: digits only, no leading zero.
fn parse_segment(segment: &str) -> Option<u32> {
    if segment.is_empty()
        || segment.starts_with('0')
        || !segment.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    segment.parse().ok()
}

// =============================================================================
// Allocation
// =============================================================================

/// Rejects levels outside 1..=4.
pub fn validate_level(level: u8) -> ValidationResult<()> {
    if level == 0 || level > MAX_ACCOUNT_LEVEL {
        return Err(ValidationError::OutOfRange {
            field: "account level".to_string(),
            min: 1,
            max: MAX_ACCOUNT_LEVEL as i64,
        });
    }
    Ok(())
}

/// Computes the next code at `level` under `parent`.
///
/// `siblings` are the codes already present under the same parent (or all
/// level-1 codes when `parent` is `None`); anything that is not a direct
/// child code is ignored.
///
/// ## Algorithm
/// ```text
/// parent = None, level = 1      max(int(code))        + 1   or "1"
/// parent = "3",  level = 2      max(k for "3.<k>")    + 1   or "3.1"
/// ```
///
/// ```rust
/// use orbit_core::account::{allocate_code, AccountCode};
///
/// let parent = AccountCode::parse("3").unwrap();
/// let next = allocate_code(Some(&parent), 2, ["3.1", "3.2"]).unwrap();
/// assert_eq!(next.as_str(), "3.3");
///
/// let next = allocate_code(None, 1, ["1", "2", "4"]).unwrap();
/// assert_eq!(next.as_str(), "5");
/// ```
pub fn allocate_code<'a, I>(
    parent: Option<&AccountCode>,
    level: u8,
    siblings: I,
) -> ValidationResult<AccountCode>
where
    I: IntoIterator<Item = &'a str>,
{
    validate_level(level)?;

    match parent {
        None => {
            if level != 1 {
                return Err(ValidationError::Required {
                    field: "parent account".to_string(),
                });
            }
            let max = siblings.into_iter().filter_map(parse_segment).max();
            AccountCode::root(next_suffix(max)?)
        }
        Some(parent) => {
            if level == 1 {
                return Err(ValidationError::invalid_format(
                    "parent account",
                    "level-1 accounts cannot have a parent",
                ));
            }
            if parent.level() + 1 != level {
                return Err(ValidationError::LevelMismatch {
                    parent_level: parent.level(),
                    level,
                });
            }
            let max = siblings
                .into_iter()
                .filter_map(|code| parent.child_suffix(code))
                .max();
            parent.child(next_suffix(max)?)
        }
    }
}

fn next_suffix(max: Option<u32>) -> ValidationResult<u32> {
    match max {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| ValidationError::OutOfRange {
            field: "account code".to_string(),
            min: 1,
            max: u32::MAX as i64,
        }),
    }
}

// =============================================================================
// Hierarchy
// =============================================================================

/// An account with its children, for tree views.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountNode {
    pub account: Account,
    pub children: Vec<AccountNode>,
}

/// Rebuilds the forest from a flat list of one company's accounts.
///
/// Children are grouped by `parent_id` and ordered numerically by code, so
/// "1.10" sorts after "1.9". Rows whose parent is not in the list are left
/// out.
pub fn build_forest(accounts: Vec<Account>) -> Vec<AccountNode> {
    let mut by_parent: HashMap<Option<String>, Vec<Account>> = HashMap::new();
    for account in accounts {
        by_parent
            .entry(account.parent_id.clone())
            .or_default()
            .push(account);
    }

    fn attach(
        parent: Option<String>,
        by_parent: &mut HashMap<Option<String>, Vec<Account>>,
    ) -> Vec<AccountNode> {
        let mut level = by_parent.remove(&parent).unwrap_or_default();
        level.sort_by_key(|a| code_order(&a.code));
        level
            .into_iter()
            .map(|account| {
                let children = attach(Some(account.id.clone()), by_parent);
                AccountNode { account, children }
            })
            .collect()
    }

    attach(None, &mut by_parent)
}

/// Numeric ordering key for a stored code: "1.9" < "1.10" < "2".
pub fn code_order(code: &str) -> Vec<u32> {
    code.split('.')
        .map(|s| s.parse().unwrap_or(u32::MAX))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
