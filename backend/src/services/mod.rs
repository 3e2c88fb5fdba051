//! Business logic services for the stock ledger

pub mod authz;
pub mod ledger;
pub mod orders;
pub mod products;
pub mod reconciliation;

pub use authz::{CapabilityCheck, RoleCapabilities};
pub use ledger::{LedgerAudit, StockLedger, StockRequest};
pub use orders::{CreateOrder, OrderTransactionEngine};
pub use products::{ProductRegistry, RegisterProduct, UpdateProduct};
pub use reconciliation::{Reconciliation, ReconciliationScheduler};
