//! Daily snapshots and inventory alert reports

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{OperationKind, Product, ProductStatus, StockOperationEntry};
use crate::validation::amount_in_range;

/// Point-in-time materialization of one product on one day.
///
/// Opening and closing quantity are both the quantity at capture time; this
/// is not a period rollup. The movement totals are read from the ledger for
/// the snapshot date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySnapshot {
    pub product_id: i64,
    pub snapshot_date: NaiveDate,
    pub opening_quantity: i64,
    pub incoming_quantity: i64,
    pub outgoing_quantity: i64,
    pub adjustment_quantity: i64,
    pub closing_quantity: i64,
    pub total_value: Decimal,
    pub refreshed_at: DateTime<Utc>,
}

/// A product that cannot be captured into a snapshot row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("Stock value of product {0} is out of range")]
    ValueOutOfRange(i64),
}

impl DailySnapshot {
    pub fn capture(
        product: &Product,
        snapshot_date: NaiveDate,
        totals: MovementTotals,
        refreshed_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        let total_value = product
            .purchase_price
            .checked_mul(Decimal::from(product.quantity))
            .filter(|value| amount_in_range(*value))
            .ok_or(SnapshotError::ValueOutOfRange(product.id))?;

        Ok(Self {
            product_id: product.id,
            snapshot_date,
            opening_quantity: product.quantity,
            incoming_quantity: totals.incoming,
            outgoing_quantity: totals.outgoing,
            adjustment_quantity: totals.adjustment,
            closing_quantity: product.quantity,
            total_value,
            refreshed_at,
        })
    }
}

/// Units moved per operation kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementTotals {
    pub incoming: i64,
    pub outgoing: i64,
    /// Sum of absolute adjustment deltas
    pub adjustment: i64,
}

impl MovementTotals {
    pub fn add(&mut self, entry: &StockOperationEntry) {
        self.add_units(entry.kind, entry.delta.abs());
    }

    pub fn add_units(&mut self, kind: OperationKind, units: i64) {
        match kind {
            OperationKind::In => self.incoming += units,
            OperationKind::Out => self.outgoing += units,
            OperationKind::Adjust => self.adjustment += units,
        }
    }
}

/// Alert category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    HighStock,
}

/// A product outside its stock thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertItem {
    pub product_id: i64,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub low_threshold: i64,
    pub high_threshold: i64,
    pub status: ProductStatus,
    pub alert_type: AlertType,
}

impl AlertItem {
    fn from_product(product: &Product, alert_type: AlertType) -> Self {
        Self {
            product_id: product.id,
            product_code: product.code.clone(),
            product_name: product.name.clone(),
            quantity: product.quantity,
            low_threshold: product.low_threshold,
            high_threshold: product.high_threshold,
            status: product.status,
            alert_type,
        }
    }
}

/// Transient threshold report; never persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertReport {
    pub generated_at: DateTime<Utc>,
    pub low_stock_count: usize,
    pub high_stock_count: usize,
    pub total_alerts: usize,
    pub items: Vec<AlertItem>,
}

impl AlertReport {
    /// Low-stock items first, then high-stock items, each in product order.
    pub fn build(products: &[Product], generated_at: DateTime<Utc>) -> Self {
        let low: Vec<AlertItem> = products
            .iter()
            .filter(|p| p.is_low_stock())
            .map(|p| AlertItem::from_product(p, AlertType::LowStock))
            .collect();
        let high: Vec<AlertItem> = products
            .iter()
            .filter(|p| p.is_high_stock())
            .map(|p| AlertItem::from_product(p, AlertType::HighStock))
            .collect();

        let low_stock_count = low.len();
        let high_stock_count = high.len();
        let mut items = low;
        items.extend(high);

        Self {
            generated_at,
            low_stock_count,
            high_stock_count,
            total_alerts: items.len(),
            items,
        }
    }
}
