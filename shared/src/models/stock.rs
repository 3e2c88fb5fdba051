//! Stock ledger models and the arithmetic of a single stock movement

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ParseEnumError;
use crate::validation::amount_in_range;

/// Kind of stock operation recorded in the ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    In,
    Out,
    Adjust,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::In => "in",
            OperationKind::Out => "out",
            OperationKind::Adjust => "adjust",
        }
    }

    /// Reason code stored when the caller's reason is missing or unknown
    pub fn default_reason(&self) -> ReasonCode {
        match self {
            OperationKind::In => ReasonCode::Purchase,
            OperationKind::Out => ReasonCode::Sale,
            OperationKind::Adjust => ReasonCode::Adjustment,
        }
    }

    /// Whether the entry is valued at the product's sale price
    pub fn uses_sale_price(&self) -> bool {
        match self {
            OperationKind::Out => true,
            OperationKind::In | OperationKind::Adjust => false,
        }
    }

    /// Compute the movement this operation causes on a product holding
    /// `before` units.
    ///
    /// For `In`/`Out` the `amount` is the quantity moved and must be positive.
    /// For `Adjust` it is the new absolute quantity; a zero delta is allowed.
    pub fn movement(&self, before: i64, amount: i64) -> Result<StockMovement, StockRuleError> {
        let delta = match self {
            OperationKind::In => {
                if amount <= 0 {
                    return Err(StockRuleError::NonPositiveQuantity(amount));
                }
                amount
            }
            OperationKind::Out => {
                if amount <= 0 {
                    return Err(StockRuleError::NonPositiveQuantity(amount));
                }
                if amount > before {
                    return Err(StockRuleError::InsufficientStock {
                        available: before,
                        requested: amount,
                    });
                }
                -amount
            }
            OperationKind::Adjust => {
                if amount < 0 {
                    return Err(StockRuleError::NegativeTarget(amount));
                }
                amount
                    .checked_sub(before)
                    .ok_or(StockRuleError::Overflow)?
            }
        };

        let after = before.checked_add(delta).ok_or(StockRuleError::Overflow)?;
        Ok(StockMovement {
            before,
            delta,
            after,
        })
    }
}

impl std::str::FromStr for OperationKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(OperationKind::In),
            "out" => Ok(OperationKind::Out),
            "adjust" => Ok(OperationKind::Adjust),
            other => Err(ParseEnumError::new("operation kind", other)),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The before/delta/after triple of one ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    pub before: i64,
    pub delta: i64,
    pub after: i64,
}

impl StockMovement {
    /// Absolute number of units moved
    pub fn units(&self) -> i64 {
        self.delta.abs()
    }

    /// Total price of the movement at `unit_price`, if it fits the stored
    /// amount range
    pub fn total_price(&self, unit_price: Decimal) -> Result<Decimal, StockRuleError> {
        unit_price
            .checked_mul(Decimal::from(self.units()))
            .filter(|total| amount_in_range(*total))
            .ok_or(StockRuleError::AmountOverflow)
    }
}

/// Violations of the stock movement rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockRuleError {
    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(i64),

    #[error("Target quantity cannot be negative, got {0}")]
    NegativeTarget(i64),

    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("Quantity out of range")]
    Overflow,

    #[error("Total price out of range")]
    AmountOverflow,
}

/// Closed set of reason codes stored on ledger entries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Purchase,
    Sale,
    Adjustment,
    Damaged,
    Expired,
    Transfer,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 6] = [
        ReasonCode::Purchase,
        ReasonCode::Sale,
        ReasonCode::Adjustment,
        ReasonCode::Damaged,
        ReasonCode::Expired,
        ReasonCode::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Purchase => "purchase",
            ReasonCode::Sale => "sale",
            ReasonCode::Adjustment => "adjustment",
            ReasonCode::Damaged => "damaged",
            ReasonCode::Expired => "expired",
            ReasonCode::Transfer => "transfer",
        }
    }

    /// Map free-form caller input onto a reason code.
    ///
    /// Unknown reason text is kept by moving it in front of the note, so the
    /// stored reason is always one of the enumerated codes.
    pub fn normalize(kind: OperationKind, reason: Option<&str>, note: Option<&str>) -> NormalizedReason {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let raw = reason.map(str::trim).filter(|r| !r.is_empty());

        match raw {
            None => NormalizedReason {
                code: kind.default_reason(),
                note: note.map(str::to_string),
            },
            Some(text) => match text.to_ascii_lowercase().parse::<ReasonCode>() {
                Ok(code) => NormalizedReason {
                    code,
                    note: note.map(str::to_string),
                },
                Err(_) => NormalizedReason {
                    code: kind.default_reason(),
                    note: Some(match note {
                        Some(n) => format!("{} {}", text, n),
                        None => text.to_string(),
                    }),
                },
            },
        }
    }
}

impl std::str::FromStr for ReasonCode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("reason code", s))
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason code and note after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedReason {
    pub code: ReasonCode,
    pub note: Option<String>,
}

/// One immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockOperationEntry {
    pub id: i64,
    pub product_id: i64,
    pub kind: OperationKind,
    /// Signed change applied to the product quantity
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub order_id: Option<String>,
    pub reason: ReasonCode,
    pub note: Option<String>,
    pub actor_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry staged inside a transaction, before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewStockEntry {
    pub product_id: i64,
    pub kind: OperationKind,
    pub movement: StockMovement,
    pub unit_price: Decimal,
    /// `unit_price` times the units moved
    pub total_price: Decimal,
    pub order_id: Option<String>,
    pub reason: ReasonCode,
    pub note: Option<String>,
    pub actor_id: i64,
    pub created_at: DateTime<Utc>,
}

impl NewStockEntry {
    pub fn into_entry(self, id: i64) -> StockOperationEntry {
        StockOperationEntry {
            id,
            product_id: self.product_id,
            kind: self.kind,
            delta: self.movement.delta,
            quantity_before: self.movement.before,
            quantity_after: self.movement.after,
            unit_price: self.unit_price,
            total_price: self.total_price,
            order_id: self.order_id,
            reason: self.reason,
            note: self.note,
            actor_id: self.actor_id,
            created_at: self.created_at,
        }
    }
}

/// Replay the signed deltas of a product's entries from an empty shelf
pub fn replay_quantity<'a, I>(entries: I) -> i64
where
    I: IntoIterator<Item = &'a StockOperationEntry>,
{
    entries.into_iter().map(|e| e.delta).sum()
}

/// Find the first entry (in id order) whose `quantity_before` does not match
/// the previous entry's `quantity_after`, or whose own arithmetic is off.
pub fn first_chain_break(entries: &[StockOperationEntry]) -> Option<i64> {
    let mut sorted: Vec<&StockOperationEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.id);

    let mut expected = 0;
    for entry in sorted {
        if entry.quantity_before != expected
            || entry.quantity_before + entry.delta != entry.quantity_after
        {
            return Some(entry.id);
        }
        expected = entry.quantity_after;
    }
    None
}
