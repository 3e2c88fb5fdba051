//! PostgreSQL store
//!
//! Exclusive holds are `SELECT ... FOR UPDATE` row locks, bounded by a
//! transaction-local `lock_timeout`. Enums are stored as text.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    DailySnapshot, DateRange, MovementTotals, NewProduct, NewStockEntry, OperationKind, Order,
    Pagination, ParseEnumError, Product, StockOperationEntry,
};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

use super::{
    normalized_keyword, InventoryStore, LedgerFilter, OrderFilter, ProductFilter, StockTx,
};
use crate::error::{AppError, AppResult};

const PRODUCT_COLUMNS: &str = "id, code, name, purchase_price, sale_price, quantity, \
     low_threshold, high_threshold, status, created_at, updated_at";

const ENTRY_COLUMNS: &str = "e.id, e.product_id, e.kind, e.delta, e.quantity_before, \
     e.quantity_after, e.unit_price, e.total_price, e.order_id, e.reason, e.note, \
     e.actor_id, e.created_at";

const ORDER_COLUMNS: &str = "order_id, order_type, total_amount, status, created_at, updated_at";

/// SQLSTATE lock_not_available
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// SQLSTATE unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(db: PgPool, lock_timeout: Duration) -> Self {
        Self { db, lock_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    code: String,
    name: String,
    purchase_price: Decimal,
    sale_price: Decimal,
    quantity: i64,
    low_threshold: i64,
    high_threshold: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> AppResult<Self> {
        Ok(Product {
            id: row.id,
            code: row.code,
            name: row.name,
            purchase_price: row.purchase_price,
            sale_price: row.sale_price,
            quantity: row.quantity,
            low_threshold: row.low_threshold,
            high_threshold: row.high_threshold,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: i64,
    product_id: i64,
    kind: String,
    delta: i64,
    quantity_before: i64,
    quantity_after: i64,
    unit_price: Decimal,
    total_price: Decimal,
    order_id: Option<String>,
    reason: String,
    note: Option<String>,
    actor_id: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for StockOperationEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> AppResult<Self> {
        Ok(StockOperationEntry {
            id: row.id,
            product_id: row.product_id,
            kind: parse_column(&row.kind)?,
            delta: row.delta,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            unit_price: row.unit_price,
            total_price: row.total_price,
            order_id: row.order_id,
            reason: parse_column(&row.reason)?,
            note: row.note,
            actor_id: row.actor_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    order_id: String,
    order_type: String,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> AppResult<Self> {
        Ok(Order {
            order_id: row.order_id,
            order_type: parse_column(&row.order_type)?,
            total_amount: row.total_amount,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    product_id: i64,
    snapshot_date: NaiveDate,
    opening_quantity: i64,
    incoming_quantity: i64,
    outgoing_quantity: i64,
    adjustment_quantity: i64,
    closing_quantity: i64,
    total_value: Decimal,
    refreshed_at: DateTime<Utc>,
}

impl From<SnapshotRow> for DailySnapshot {
    fn from(row: SnapshotRow) -> Self {
        DailySnapshot {
            product_id: row.product_id,
            snapshot_date: row.snapshot_date,
            opening_quantity: row.opening_quantity,
            incoming_quantity: row.incoming_quantity,
            outgoing_quantity: row.outgoing_quantity,
            adjustment_quantity: row.adjustment_quantity,
            closing_quantity: row.closing_quantity,
            total_value: row.total_value,
            refreshed_at: row.refreshed_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    product_id: i64,
    kind: String,
    units: i64,
}

fn parse_column<T>(value: &str) -> AppResult<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .parse()
        .map_err(|e: ParseEnumError| AppError::Internal(format!("Stored value rejected: {}", e)))
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Error mapping
// ============================================================================

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Map lock waits that exceeded `lock_timeout` onto [`AppError::LockTimeout`]
fn lock_error(err: sqlx::Error, what: impl FnOnce() -> String) -> AppError {
    if sqlstate(&err).as_deref() == Some(LOCK_NOT_AVAILABLE) {
        AppError::LockTimeout(what())
    } else {
        AppError::DatabaseError(err)
    }
}

/// Map unique violations onto [`AppError::DuplicateEntry`]
fn unique_error(err: sqlx::Error, what: &str) -> AppError {
    if sqlstate(&err).as_deref() == Some(UNIQUE_VIOLATION) {
        AppError::DuplicateEntry(what.to_string())
    } else {
        lock_error(err, || what.to_string())
    }
}

// ============================================================================
// Filters
// ============================================================================

/// Escape LIKE metacharacters and wrap in wildcards
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_range(qb: &mut QueryBuilder<'_, Postgres>, column: &str, range: &DateRange) {
    if let Some(start) = range.start_at() {
        qb.push(format!(" AND {} >= ", column));
        qb.push_bind(start);
    }
    if let Some(end) = range.end_before() {
        qb.push(format!(" AND {} < ", column));
        qb.push_bind(end);
    }
}

fn push_ledger_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &LedgerFilter) {
    qb.push(" FROM stock_operations e JOIN products p ON p.id = e.product_id WHERE TRUE");
    if let Some(product_id) = filter.product_id {
        qb.push(" AND e.product_id = ");
        qb.push_bind(product_id);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND e.kind = ");
        qb.push_bind(kind.as_str());
    }
    push_range(qb, "e.created_at", &filter.range);
    if let Some(keyword) = normalized_keyword(&filter.keyword) {
        let pattern = like_pattern(&keyword);
        qb.push(" AND (LOWER(p.code) LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR LOWER(p.name) LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR LOWER(COALESCE(e.order_id, '')) LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR LOWER(COALESCE(e.note, '')) LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" FROM orders WHERE TRUE");
    if let Some(order_type) = filter.order_type {
        qb.push(" AND order_type = ");
        qb.push_bind(order_type.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status.as_str());
    }
    push_range(qb, "created_at", &filter.range);
    if let Some(keyword) = normalized_keyword(&filter.keyword) {
        qb.push(" AND LOWER(order_id) LIKE ");
        qb.push_bind(like_pattern(&keyword));
    }
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" FROM products WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status.as_str());
    }
    if let Some(keyword) = normalized_keyword(&filter.keyword) {
        let pattern = like_pattern(&keyword);
        qb.push(" AND (LOWER(code) LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR LOWER(name) LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Pagination) {
    qb.push(" LIMIT ");
    qb.push_bind(i64::try_from(page.limit()).unwrap_or(i64::MAX));
    qb.push(" OFFSET ");
    qb.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
}

fn total_from(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

// ============================================================================
// Store
// ============================================================================

#[async_trait]
impl InventoryStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        let mut tx = self.db.begin().await?;

        // Bounds every row-lock wait inside this transaction.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;

        Ok(PgTx { tx })
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        let now = Utc::now();
        let template = product.into_product(0, now);

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (
                code, name, purchase_price, sale_price, quantity,
                low_threshold, high_threshold, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&template.code)
        .bind(&template.name)
        .bind(template.purchase_price)
        .bind(template.sale_price)
        .bind(template.quantity)
        .bind(template.low_threshold)
        .bind(template.high_threshold)
        .bind(template.status.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_error(e, "Product code"))?;

        row.try_into()
    }

    async fn find_product(&self, product_id: i64) -> AppResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_product_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {}", PRODUCT_COLUMNS));
        push_product_filter(&mut select, filter);
        select.push(" ORDER BY id");
        push_page(&mut select, page);
        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(&self.db).await?;

        Ok((convert_all(rows)?, total_from(total)))
    }

    async fn all_products(&self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products ORDER BY id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn find_entry(&self, entry_id: i64) -> AppResult<Option<StockOperationEntry>> {
        sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM stock_operations e WHERE e.id = $1",
            ENTRY_COLUMNS
        ))
        .bind(entry_id)
        .fetch_optional(&self.db)
        .await?
        .map(StockOperationEntry::try_from)
        .transpose()
    }

    async fn query_entries(
        &self,
        filter: &LedgerFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockOperationEntry>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_ledger_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {}", ENTRY_COLUMNS));
        push_ledger_filter(&mut select, filter);
        select.push(" ORDER BY e.created_at DESC, e.id DESC");
        push_page(&mut select, page);
        let rows: Vec<EntryRow> = select.build_query_as().fetch_all(&self.db).await?;

        Ok((convert_all(rows)?, total_from(total)))
    }

    async fn entries_for_product(&self, product_id: i64) -> AppResult<Vec<StockOperationEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM stock_operations e WHERE e.product_id = $1 ORDER BY e.id",
            ENTRY_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn entries_for_order(&self, order_id: &str) -> AppResult<Vec<StockOperationEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM stock_operations e WHERE e.order_id = $1 ORDER BY e.id",
            ENTRY_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        convert_all(rows)
    }

    async fn find_order(&self, order_id: &str) -> AppResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE order_id = $1",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Order>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_order_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {}", ORDER_COLUMNS));
        push_order_filter(&mut select, filter);
        select.push(" ORDER BY created_at DESC, order_id DESC");
        push_page(&mut select, page);
        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(&self.db).await?;

        Ok((convert_all(rows)?, total_from(total)))
    }

    async fn movement_totals(&self, date: NaiveDate) -> AppResult<HashMap<i64, MovementTotals>> {
        let range = DateRange::day(date);
        let (Some(start), Some(end)) = (range.start_at(), range.end_before()) else {
            return Ok(HashMap::new());
        };

        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT product_id, kind, COALESCE(SUM(ABS(delta)), 0)::BIGINT AS units
            FROM stock_operations
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY product_id, kind
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        let mut totals: HashMap<i64, MovementTotals> = HashMap::new();
        for row in rows {
            let kind: OperationKind = parse_column(&row.kind)?;
            totals
                .entry(row.product_id)
                .or_default()
                .add_units(kind, row.units);
        }
        Ok(totals)
    }

    async fn upsert_snapshots(&self, snapshots: &[DailySnapshot]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for s in snapshots {
            sqlx::query(
                r#"
                INSERT INTO daily_snapshots (
                    product_id, snapshot_date, opening_quantity, incoming_quantity,
                    outgoing_quantity, adjustment_quantity, closing_quantity,
                    total_value, refreshed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (product_id, snapshot_date) DO UPDATE SET
                    opening_quantity = EXCLUDED.opening_quantity,
                    incoming_quantity = EXCLUDED.incoming_quantity,
                    outgoing_quantity = EXCLUDED.outgoing_quantity,
                    adjustment_quantity = EXCLUDED.adjustment_quantity,
                    closing_quantity = EXCLUDED.closing_quantity,
                    total_value = EXCLUDED.total_value,
                    refreshed_at = EXCLUDED.refreshed_at
                "#,
            )
            .bind(s.product_id)
            .bind(s.snapshot_date)
            .bind(s.opening_quantity)
            .bind(s.incoming_quantity)
            .bind(s.outgoing_quantity)
            .bind(s.adjustment_quantity)
            .bind(s.closing_quantity)
            .bind(s.total_value)
            .bind(s.refreshed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn snapshots_for_date(&self, date: NaiveDate) -> AppResult<Vec<DailySnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT product_id, snapshot_date, opening_quantity, incoming_quantity,
                   outgoing_quantity, adjustment_quantity, closing_quantity,
                   total_value, refreshed_at
            FROM daily_snapshots
            WHERE snapshot_date = $1
            ORDER BY product_id
            "#,
        )
        .bind(date)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(DailySnapshot::from).collect())
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Database transaction; dropped without `commit` it rolls back
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTx for PgTx {
    async fn lock_product(&mut self, product_id: i64) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, || format!("product {}", product_id)))?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?
        .try_into()
    }

    async fn save_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, purchase_price = $3, sale_price = $4, quantity = $5,
                low_threshold = $6, high_threshold = $7, status = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.purchase_price)
        .bind(product.sale_price)
        .bind(product.quantity)
        .bind(product.low_threshold)
        .bind(product.high_threshold)
        .bind(product.status.as_str())
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, || format!("product {}", product.id)))?;

        Ok(())
    }

    async fn append_entry(&mut self, entry: NewStockEntry) -> AppResult<StockOperationEntry> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            WITH e AS (
                INSERT INTO stock_operations (
                    product_id, kind, delta, quantity_before, quantity_after,
                    unit_price, total_price, order_id, reason, note, actor_id, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING *
            )
            SELECT {} FROM e
            "#,
            ENTRY_COLUMNS
        ))
        .bind(entry.product_id)
        .bind(entry.kind.as_str())
        .bind(entry.movement.delta)
        .bind(entry.movement.before)
        .bind(entry.movement.after)
        .bind(entry.unit_price)
        .bind(entry.total_price)
        .bind(&entry.order_id)
        .bind(entry.reason.as_str())
        .bind(&entry.note)
        .bind(entry.actor_id)
        .bind(entry.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn order_exists(&mut self, order_id: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_id = $1)")
                .bind(order_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn insert_order(&mut self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, order_type, total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&order.order_id)
        .bind(order.order_type.as_str())
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_error(e, "Order ID"))?;

        Ok(())
    }

    async fn lock_order(&mut self, order_id: &str) -> AppResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE order_id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, || format!("order {}", order_id)))?
        .map(Order::try_from)
        .transpose()
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, total_amount = $3, updated_at = $4
            WHERE order_id = $1
            "#,
        )
        .bind(&order.order_id)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, || format!("order {}", order.order_id)))?;

        Ok(())
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_parse_column_rejects_unknown_value() {
        let err = parse_column::<OperationKind>("transfer").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_ledger_filter_sql() {
        let filter = LedgerFilter {
            product_id: Some(7),
            kind: Some(OperationKind::Out),
            range: DateRange::day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            keyword: Some("  Beans ".to_string()),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_ledger_filter(&mut qb, &filter);
        let sql = qb.sql();

        assert!(sql.contains("e.product_id = $1"));
        assert!(sql.contains("e.kind = $2"));
        assert!(sql.contains("e.created_at >= $3"));
        assert!(sql.contains("e.created_at < $4"));
        assert!(sql.contains("LOWER(COALESCE(e.note, '')) LIKE $8"));
    }
}
