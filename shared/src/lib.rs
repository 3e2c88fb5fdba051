//! Shared types and models for the stock ledger service
//!
//! Domain types, the pure stock movement rules and input validation. Nothing
//! in this crate performs I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
