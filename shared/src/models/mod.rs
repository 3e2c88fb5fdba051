//! Domain models for the stock ledger

mod order;
mod product;
mod snapshot;
mod stock;
mod user;

pub use order::*;
pub use product::*;
pub use snapshot::*;
pub use stock::*;
pub use user::*;

use thiserror::Error;

/// Returned when a string does not name a variant of a closed enum
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
