//! Product registry models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Default low-stock threshold for newly registered products
pub const DEFAULT_LOW_THRESHOLD: i64 = 10;

/// Default high-stock threshold for newly registered products
pub const DEFAULT_HIGH_THRESHOLD: i64 = 1000;

/// A product tracked by the stock ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    /// Immutable business key
    pub code: String,
    pub name: String,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    /// Current on-hand quantity, never negative
    pub quantity: i64,
    pub low_threshold: i64,
    pub high_threshold: i64,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Set a new quantity and re-derive the status in one step.
    ///
    /// This is the only way quantity changes on a product value, so the
    /// stored status can never drift from the quantity it describes.
    pub fn set_quantity(&mut self, quantity: i64, at: DateTime<Utc>) {
        self.quantity = quantity;
        self.status = ProductStatus::derive(quantity, self.low_threshold, self.status);
        self.updated_at = at;
    }

    /// Administrative status change.
    ///
    /// `Disabled` sets the override. Any other value lifts it, and the status
    /// is derived from the current quantity again.
    pub fn set_status(&mut self, requested: ProductStatus, at: DateTime<Utc>) {
        self.status = match requested {
            ProductStatus::Disabled => ProductStatus::Disabled,
            ProductStatus::Active | ProductStatus::OutOfStock => {
                ProductStatus::derive(self.quantity, self.low_threshold, ProductStatus::Active)
            }
        };
        self.updated_at = at;
    }

    pub fn set_thresholds(&mut self, low: i64, high: i64, at: DateTime<Utc>) {
        self.low_threshold = low;
        self.high_threshold = high;
        self.status = ProductStatus::derive(self.quantity, low, self.status);
        self.updated_at = at;
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_threshold
    }

    pub fn is_high_stock(&self) -> bool {
        self.quantity >= self.high_threshold
    }
}

/// Product status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    OutOfStock,
    /// Administrative override, never produced by quantity changes
    Disabled,
}

impl ProductStatus {
    /// Derive the status for a quantity.
    ///
    /// `Disabled` is sticky: it is kept as-is regardless of quantity.
    pub fn derive(quantity: i64, low_threshold: i64, current: ProductStatus) -> Self {
        match current {
            ProductStatus::Disabled => ProductStatus::Disabled,
            ProductStatus::Active | ProductStatus::OutOfStock => {
                if quantity <= 0 || quantity <= low_threshold {
                    ProductStatus::OutOfStock
                } else {
                    ProductStatus::Active
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::OutOfStock => "out_of_stock",
            ProductStatus::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProductStatus::Active),
            "out_of_stock" => Ok(ProductStatus::OutOfStock),
            "disabled" | "inactive" => Ok(ProductStatus::Disabled),
            other => Err(ParseEnumError::new("product status", other)),
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration data for a new product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub low_threshold: i64,
    pub high_threshold: i64,
}

impl NewProduct {
    /// Materialize the product as stored, starting from an empty shelf.
    pub fn into_product(self, id: i64, at: DateTime<Utc>) -> Product {
        let status = ProductStatus::derive(0, self.low_threshold, ProductStatus::Active);
        Product {
            id,
            code: self.code,
            name: self.name,
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            quantity: 0,
            low_threshold: self.low_threshold,
            high_threshold: self.high_threshold,
            status,
            created_at: at,
            updated_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_out_of_stock_at_zero() {
        assert_eq!(
            ProductStatus::derive(0, 0, ProductStatus::Active),
            ProductStatus::OutOfStock
        );
    }

    #[test]
    fn test_status_out_of_stock_at_threshold() {
        assert_eq!(
            ProductStatus::derive(10, 10, ProductStatus::Active),
            ProductStatus::OutOfStock
        );
        assert_eq!(
            ProductStatus::derive(11, 10, ProductStatus::OutOfStock),
            ProductStatus::Active
        );
    }

    #[test]
    fn test_disabled_is_sticky() {
        assert_eq!(
            ProductStatus::derive(500, 10, ProductStatus::Disabled),
            ProductStatus::Disabled
        );
        assert_eq!(
            ProductStatus::derive(0, 10, ProductStatus::Disabled),
            ProductStatus::Disabled
        );
    }

    #[test]
    fn test_set_quantity_rederives_status() {
        let now = Utc::now();
        let mut product = NewProduct {
            code: "P-001".to_string(),
            name: "Rice 5kg".to_string(),
            purchase_price: Decimal::new(1000, 2),
            sale_price: Decimal::new(1500, 2),
            low_threshold: 5,
            high_threshold: 100,
        }
        .into_product(1, now);

        assert_eq!(product.quantity, 0);
        assert_eq!(product.status, ProductStatus::OutOfStock);

        product.set_quantity(20, now);
        assert_eq!(product.status, ProductStatus::Active);

        product.set_quantity(5, now);
        assert_eq!(product.status, ProductStatus::OutOfStock);
    }

    #[test]
    fn test_status_override_and_thresholds() {
        let now = Utc::now();
        let mut product = NewProduct {
            code: "P-002".to_string(),
            name: "Flour 1kg".to_string(),
            purchase_price: Decimal::new(200, 2),
            sale_price: Decimal::new(300, 2),
            low_threshold: 5,
            high_threshold: 100,
        }
        .into_product(2, now);
        product.set_quantity(8, now);
        assert_eq!(product.status, ProductStatus::Active);

        product.set_status(ProductStatus::Disabled, now);
        product.set_thresholds(10, 100, now);
        assert_eq!(product.status, ProductStatus::Disabled);

        // Lifting the override re-derives from quantity, 8 <= 10.
        product.set_status(ProductStatus::Active, now);
        assert_eq!(product.status, ProductStatus::OutOfStock);

        product.set_thresholds(2, 100, now);
        assert_eq!(product.status, ProductStatus::Active);
    }

    #[test]
    fn test_parse_inactive_alias() {
        assert_eq!("inactive".parse::<ProductStatus>().unwrap(), ProductStatus::Disabled);
        assert!("archived".parse::<ProductStatus>().is_err());
    }
}
