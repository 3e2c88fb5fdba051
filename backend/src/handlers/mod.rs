//! HTTP request handlers

pub mod health;
pub mod orders;
pub mod products;
pub mod reports;
pub mod stock;

pub use health::*;
pub use orders::*;
pub use products::*;
pub use reports::*;
pub use stock::*;
