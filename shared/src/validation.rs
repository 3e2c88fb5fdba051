//! Validation utilities for ledger inputs

use rust_decimal::Decimal;

use crate::models::{OrderItem, MAX_ORDER_ID_LEN};

/// Maximum length of a product code
pub const MAX_PRODUCT_CODE_LEN: usize = 50;

/// Maximum length of a product name
pub const MAX_PRODUCT_NAME_LEN: usize = 100;

/// Decimal places kept for prices and amounts
pub const MONEY_SCALE: u32 = 2;

/// Largest unit price in cents, the range of a `NUMERIC(14, 2)` column
pub const MAX_PRICE_CENTS: i64 = 99_999_999_999_999;

/// Largest total amount in cents, the range of a `NUMERIC(16, 2)` column
pub const MAX_AMOUNT_CENTS: i64 = 9_999_999_999_999_999;

/// Whether a computed total fits the stored amount columns
pub fn amount_in_range(amount: Decimal) -> bool {
    amount.abs() <= Decimal::new(MAX_AMOUNT_CENTS, MONEY_SCALE)
}

// ============================================================================
// Order Validations
// ============================================================================

/// Validate a caller-supplied order id
pub fn validate_order_id(order_id: &str) -> Result<(), &'static str> {
    if order_id.trim().is_empty() {
        return Err("Order ID is required");
    }
    if order_id.len() > MAX_ORDER_ID_LEN {
        return Err("Order ID must be at most 50 characters");
    }
    if order_id.chars().any(char::is_control) {
        return Err("Order ID cannot contain control characters");
    }
    Ok(())
}

/// Validate the line items of an order
pub fn validate_order_items(items: &[OrderItem]) -> Result<(), &'static str> {
    if items.is_empty() {
        return Err("Items must be a non-empty list");
    }
    for item in items {
        if item.quantity <= 0 {
            return Err("Quantity must be positive for each item");
        }
        validate_price(item.unit_price)?;
    }
    Ok(())
}

// ============================================================================
// Product Validations
// ============================================================================

/// Validate a product business code
pub fn validate_product_code(code: &str) -> Result<(), &'static str> {
    if code.trim().is_empty() {
        return Err("Product code is required");
    }
    if code.len() > MAX_PRODUCT_CODE_LEN {
        return Err("Product code must be at most 50 characters");
    }
    if code.chars().any(char::is_whitespace) {
        return Err("Product code cannot contain whitespace");
    }
    Ok(())
}

/// Validate a product display name
pub fn validate_product_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Product name is required");
    }
    if name.chars().count() > MAX_PRODUCT_NAME_LEN {
        return Err("Product name must be at most 100 characters");
    }
    Ok(())
}

/// Validate a price: not negative, at most two decimal places and within
/// the stored column range
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err("Price cannot be negative");
    }
    if price.normalize().scale() > MONEY_SCALE {
        return Err("Price cannot have more than 2 decimal places");
    }
    if price > Decimal::new(MAX_PRICE_CENTS, MONEY_SCALE) {
        return Err("Price is too large");
    }
    Ok(())
}

/// Validate low/high stock thresholds
pub fn validate_thresholds(low: i64, high: i64) -> Result<(), &'static str> {
    if low < 0 || high < 0 {
        return Err("Thresholds cannot be negative");
    }
    if low > high {
        return Err("Low threshold cannot exceed high threshold");
    }
    Ok(())
}
