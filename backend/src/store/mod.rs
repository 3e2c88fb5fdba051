//! Persistence for products, ledger entries, orders and snapshots
//!
//! [`InventoryStore`] covers the non-locking reads and the snapshot writes;
//! every quantity change goes through a [`StockTx`], which owns the exclusive
//! holds it has taken and releases them when it is committed or dropped.
//! Dropping a transaction without committing discards everything staged in it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    DailySnapshot, DateRange, MovementTotals, NewProduct, NewStockEntry, OperationKind, Order,
    OrderStatus, OrderType, Pagination, Product, ProductStatus, StockOperationEntry,
};

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, MemoryTx};
pub use postgres::{PgStore, PgTx};

/// Filters for ledger queries
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub product_id: Option<i64>,
    pub kind: Option<OperationKind>,
    pub range: DateRange,
    /// Matches product code, product name, order id or note, case-insensitively
    pub keyword: Option<String>,
}

/// Filters for order listings
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub range: DateRange,
    /// Matches the order id, case-insensitively
    pub keyword: Option<String>,
}

/// Filters for product listings
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Matches code or name, case-insensitively
    pub keyword: Option<String>,
    pub status: Option<ProductStatus>,
}

/// Read side of the store plus snapshot persistence
#[async_trait]
pub trait InventoryStore: Clone + Send + Sync + 'static {
    type Tx: StockTx;

    /// Open a transaction scope for quantity and order mutations
    async fn begin(&self) -> AppResult<Self::Tx>;

    /// Cheap liveness check
    async fn ping(&self) -> AppResult<()>;

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product>;

    async fn find_product(&self, product_id: i64) -> AppResult<Option<Product>>;

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Product>, u64)>;

    /// Every product in id order
    async fn all_products(&self) -> AppResult<Vec<Product>>;

    async fn find_entry(&self, entry_id: i64) -> AppResult<Option<StockOperationEntry>>;

    /// Entries matching `filter`, newest first, with the total match count
    async fn query_entries(
        &self,
        filter: &LedgerFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockOperationEntry>, u64)>;

    /// Every entry of one product in id order
    async fn entries_for_product(&self, product_id: i64) -> AppResult<Vec<StockOperationEntry>>;

    /// Every entry created by one order in id order
    async fn entries_for_order(&self, order_id: &str) -> AppResult<Vec<StockOperationEntry>>;

    async fn find_order(&self, order_id: &str) -> AppResult<Option<Order>>;

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Order>, u64)>;

    /// Units moved per product and kind on `date`
    async fn movement_totals(&self, date: NaiveDate) -> AppResult<HashMap<i64, MovementTotals>>;

    /// Insert or overwrite snapshots keyed by (product, date)
    async fn upsert_snapshots(&self, snapshots: &[DailySnapshot]) -> AppResult<()>;

    async fn snapshots_for_date(&self, date: NaiveDate) -> AppResult<Vec<DailySnapshot>>;
}

/// One all-or-nothing unit of work
#[async_trait]
pub trait StockTx: Send {
    /// Take the exclusive hold on a product and return its current state.
    ///
    /// The hold lasts until the transaction ends. Calling this again for a
    /// product already held returns the state staged in this transaction.
    async fn lock_product(&mut self, product_id: i64) -> AppResult<Product>;

    /// Stage every mutable field of a product held by this transaction
    async fn save_product(&mut self, product: &Product) -> AppResult<()>;

    /// Stage a ledger entry for a product held by this transaction
    async fn append_entry(&mut self, entry: NewStockEntry) -> AppResult<StockOperationEntry>;

    async fn order_exists(&mut self, order_id: &str) -> AppResult<bool>;

    async fn insert_order(&mut self, order: &Order) -> AppResult<()>;

    /// Take the exclusive hold on an order row
    async fn lock_order(&mut self, order_id: &str) -> AppResult<Option<Order>>;

    /// Stage the status, total and update time of an order
    async fn update_order(&mut self, order: &Order) -> AppResult<()>;

    /// Publish everything staged and release the holds
    async fn commit(self) -> AppResult<()>;
}

/// Lowercased keyword, or `None` when blank
pub(crate) fn normalized_keyword(keyword: &Option<String>) -> Option<String> {
    keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_lowercase)
}
