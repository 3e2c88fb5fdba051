//! Purchase/sale orders and their status state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OperationKind, ParseEnumError, ReasonCode};
use crate::validation::amount_in_range;

/// Maximum length of a caller-supplied order id
pub const MAX_ORDER_ID_LEN: usize = 50;

/// An order applied to the ledger as one unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub order_type: OrderType,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Purchase,
    Sale,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Purchase => "purchase",
            OrderType::Sale => "sale",
        }
    }

    /// Ledger operation produced by each line item
    pub fn operation_kind(&self) -> OperationKind {
        match self {
            OrderType::Purchase => OperationKind::In,
            OrderType::Sale => OperationKind::Out,
        }
    }

    /// Reason code stored on each line item's ledger entry
    pub fn reason(&self) -> ReasonCode {
        match self {
            OrderType::Purchase => ReasonCode::Purchase,
            OrderType::Sale => ReasonCode::Sale,
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(OrderType::Purchase),
            "sale" => Ok(OrderType::Sale),
            other => Err(ParseEnumError::new("order type", other)),
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable from this one
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseEnumError::new("order status", other)),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl OrderItem {
    /// `None` when the product overflows
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Sum of line totals, or `None` when it leaves the stored amount range
pub fn order_total(items: &[OrderItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.line_total()?))
        .filter(|total| amount_in_range(*total))
}

/// Distinct product ids of an order in ascending order.
///
/// Product holds for a multi-item order are always taken in this order.
pub fn lock_order(items: &[OrderItem]) -> Vec<i64> {
    let mut ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Pending));

        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Processing.is_terminal());
    }

    #[test]
    fn test_order_total() {
        let items = vec![
            OrderItem {
                product_id: 1,
                quantity: 3,
                unit_price: Decimal::new(1000, 2),
            },
            OrderItem {
                product_id: 2,
                quantity: 2,
                unit_price: Decimal::new(500, 2),
            },
        ];
        assert_eq!(order_total(&items), Some(Decimal::new(4000, 2)));
    }

    #[test]
    fn test_order_total_out_of_range() {
        let line = |unit_price| OrderItem {
            product_id: 1,
            quantity: 1_000_000_000,
            unit_price,
        };
        let huge = Decimal::from_i128_with_scale(10i128.pow(23), 0);
        assert_eq!(line(huge).line_total(), None);
        assert_eq!(order_total(&[line(huge)]), None);

        // Each line fits, the sum does not.
        let big = OrderItem {
            product_id: 1,
            quantity: 10_000,
            unit_price: Decimal::new(6_000_000_000, 0),
        };
        assert!(order_total(&[big.clone()]).is_some());
        assert_eq!(order_total(&[big.clone(), big]), None);
    }

    #[test]
    fn test_lock_order_is_sorted_and_distinct() {
        let item = |product_id| OrderItem {
            product_id,
            quantity: 1,
            unit_price: Decimal::ZERO,
        };
        let items = vec![item(7), item(2), item(7), item(5)];
        assert_eq!(lock_order(&items), vec![2, 5, 7]);
    }

    #[test]
    fn test_order_type_mapping() {
        assert_eq!(OrderType::Purchase.operation_kind(), OperationKind::In);
        assert_eq!(OrderType::Sale.operation_kind(), OperationKind::Out);
        assert_eq!(OrderType::Sale.reason(), ReasonCode::Sale);
    }
}
