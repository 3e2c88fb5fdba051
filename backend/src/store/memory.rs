//! In-process store with the same locking and commit semantics as Postgres
//!
//! Each product (and order) has its own async mutex standing in for the row
//! lock. A [`MemoryTx`] keeps the guards it acquired together with its staged
//! writes; `commit` publishes the writes under a short state lock, and
//! dropping the transaction releases the guards without publishing anything.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use shared::{
    DailySnapshot, DateRange, MovementTotals, NewProduct, NewStockEntry, Order, Pagination,
    Product, StockOperationEntry,
};
use tokio::sync::OwnedMutexGuard;

use super::{
    normalized_keyword, InventoryStore, LedgerFilter, OrderFilter, ProductFilter, StockTx,
};
use crate::error::{AppError, AppResult};

/// Memory-backed store, cheap to clone
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: RwLock<State>,
    product_locks: KeyedLocks<i64>,
    order_locks: KeyedLocks<String>,
    next_product_id: AtomicI64,
    next_entry_id: AtomicI64,
    lock_timeout: Duration,
}

#[derive(Default)]
struct State {
    products: BTreeMap<i64, Product>,
    entries: Vec<StockOperationEntry>,
    orders: HashMap<String, Order>,
    snapshots: BTreeMap<(NaiveDate, i64), DailySnapshot>,
}

/// Lazily created async mutex per key.
///
/// A slot whose `Arc` is held only by the table has no holder and no waiter,
/// and is dropped on the next acquire.
struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Wait up to `timeout` for the key's mutex; `Ok(None)` on timeout
    async fn acquire(&self, key: &K, timeout: Duration) -> AppResult<Option<OwnedMutexGuard<()>>> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| AppError::Internal("lock table poisoned".to_string()))?;
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(key.clone()).or_default().clone()
        };

        Ok(tokio::time::timeout(timeout, slot.lock_owned()).await.ok())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                product_locks: KeyedLocks::new(),
                order_locks: KeyedLocks::new(),
                next_product_id: AtomicI64::new(1),
                next_entry_id: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }
}

impl Inner {
    fn read(&self) -> AppResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| AppError::Internal("store state poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| AppError::Internal("store state poisoned".to_string()))
    }
}

fn page_of<T: Clone>(items: Vec<T>, page: Pagination) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
    (items.into_iter().skip(offset).take(limit).collect(), total)
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

#[async_trait]
impl InventoryStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        Ok(MemoryTx {
            inner: self.inner.clone(),
            product_guards: HashMap::new(),
            order_guards: HashMap::new(),
            products: HashMap::new(),
            saved_products: Vec::new(),
            entries: Vec::new(),
            new_orders: Vec::new(),
            updated_orders: HashMap::new(),
        })
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.read().map(|_| ())
    }

    async fn insert_product(&self, product: NewProduct) -> AppResult<Product> {
        let mut state = self.inner.write()?;
        if state.products.values().any(|p| p.code == product.code) {
            return Err(AppError::DuplicateEntry("Product code".to_string()));
        }
        let id = self.inner.next_product_id.fetch_add(1, Ordering::SeqCst);
        let product = product.into_product(id, Utc::now());
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, product_id: i64) -> AppResult<Option<Product>> {
        Ok(self.inner.read()?.products.get(&product_id).cloned())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Product>, u64)> {
        let keyword = normalized_keyword(&filter.keyword);
        let state = self.inner.read()?;
        let matches: Vec<Product> = state
            .products
            .values()
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| {
                keyword.as_deref().map_or(true, |k| {
                    contains_ci(Some(p.code.as_str()), k) || contains_ci(Some(p.name.as_str()), k)
                })
            })
            .cloned()
            .collect();
        Ok(page_of(matches, page))
    }

    async fn all_products(&self) -> AppResult<Vec<Product>> {
        Ok(self.inner.read()?.products.values().cloned().collect())
    }

    async fn find_entry(&self, entry_id: i64) -> AppResult<Option<StockOperationEntry>> {
        Ok(self
            .inner
            .read()?
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .cloned())
    }

    async fn query_entries(
        &self,
        filter: &LedgerFilter,
        page: Pagination,
    ) -> AppResult<(Vec<StockOperationEntry>, u64)> {
        let keyword = normalized_keyword(&filter.keyword);
        let state = self.inner.read()?;
        let mut matches: Vec<StockOperationEntry> = state
            .entries
            .iter()
            .filter(|e| filter.product_id.map_or(true, |id| e.product_id == id))
            .filter(|e| filter.kind.map_or(true, |k| e.kind == k))
            .filter(|e| filter.range.contains(e.created_at))
            .filter(|e| {
                keyword.as_deref().map_or(true, |k| {
                    let product = state.products.get(&e.product_id);
                    contains_ci(product.map(|p| p.code.as_str()), k)
                        || contains_ci(product.map(|p| p.name.as_str()), k)
                        || contains_ci(e.order_id.as_deref(), k)
                        || contains_ci(e.note.as_deref(), k)
                })
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page_of(matches, page))
    }

    async fn entries_for_product(&self, product_id: i64) -> AppResult<Vec<StockOperationEntry>> {
        let mut entries: Vec<StockOperationEntry> = self
            .inner
            .read()?
            .entries
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn entries_for_order(&self, order_id: &str) -> AppResult<Vec<StockOperationEntry>> {
        let mut entries: Vec<StockOperationEntry> = self
            .inner
            .read()?
            .entries
            .iter()
            .filter(|e| e.order_id.as_deref() == Some(order_id))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn find_order(&self, order_id: &str) -> AppResult<Option<Order>> {
        Ok(self.inner.read()?.orders.get(order_id).cloned())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> AppResult<(Vec<Order>, u64)> {
        let keyword = normalized_keyword(&filter.keyword);
        let state = self.inner.read()?;
        let mut matches: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.order_type.map_or(true, |t| o.order_type == t))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| filter.range.contains(o.created_at))
            .filter(|o| {
                keyword
                    .as_deref()
                    .map_or(true, |k| contains_ci(Some(o.order_id.as_str()), k))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.order_id.cmp(&a.order_id))
        });
        Ok(page_of(matches, page))
    }

    async fn movement_totals(&self, date: NaiveDate) -> AppResult<HashMap<i64, MovementTotals>> {
        let range = DateRange::day(date);
        let state = self.inner.read()?;
        let mut totals: HashMap<i64, MovementTotals> = HashMap::new();
        for entry in state.entries.iter().filter(|e| range.contains(e.created_at)) {
            totals.entry(entry.product_id).or_default().add(entry);
        }
        Ok(totals)
    }

    async fn upsert_snapshots(&self, snapshots: &[DailySnapshot]) -> AppResult<()> {
        let mut state = self.inner.write()?;
        for snapshot in snapshots {
            state
                .snapshots
                .insert((snapshot.snapshot_date, snapshot.product_id), snapshot.clone());
        }
        Ok(())
    }

    async fn snapshots_for_date(&self, date: NaiveDate) -> AppResult<Vec<DailySnapshot>> {
        Ok(self
            .inner
            .read()?
            .snapshots
            .range((date, i64::MIN)..=(date, i64::MAX))
            .map(|(_, s)| s.clone())
            .collect())
    }
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTx {
    inner: Arc<Inner>,
    product_guards: HashMap<i64, OwnedMutexGuard<()>>,
    order_guards: HashMap<String, OwnedMutexGuard<()>>,
    /// Working copies of held products
    products: HashMap<i64, Product>,
    saved_products: Vec<i64>,
    entries: Vec<StockOperationEntry>,
    new_orders: Vec<Order>,
    updated_orders: HashMap<String, Order>,
}

impl MemoryTx {
    fn require_held(&self, product_id: i64) -> AppResult<()> {
        if self.product_guards.contains_key(&product_id) {
            Ok(())
        } else {
            Err(AppError::Internal(format!(
                "product {} written without an exclusive hold",
                product_id
            )))
        }
    }
}

#[async_trait]
impl StockTx for MemoryTx {
    async fn lock_product(&mut self, product_id: i64) -> AppResult<Product> {
        if let Some(product) = self.products.get(&product_id) {
            return Ok(product.clone());
        }

        if !self.inner.read()?.products.contains_key(&product_id) {
            return Err(AppError::NotFound(format!("Product {}", product_id)));
        }

        let guard = self
            .inner
            .product_locks
            .acquire(&product_id, self.inner.lock_timeout)
            .await?
            .ok_or_else(|| AppError::LockTimeout(format!("product {}", product_id)))?;

        let product = self
            .inner
            .read()?
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;

        self.product_guards.insert(product_id, guard);
        self.products.insert(product_id, product.clone());
        Ok(product)
    }

    async fn save_product(&mut self, product: &Product) -> AppResult<()> {
        self.require_held(product.id)?;
        self.products.insert(product.id, product.clone());
        if !self.saved_products.contains(&product.id) {
            self.saved_products.push(product.id);
        }
        Ok(())
    }

    async fn append_entry(&mut self, entry: NewStockEntry) -> AppResult<StockOperationEntry> {
        self.require_held(entry.product_id)?;
        let id = self.inner.next_entry_id.fetch_add(1, Ordering::SeqCst);
        let entry = entry.into_entry(id);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn order_exists(&mut self, order_id: &str) -> AppResult<bool> {
        if self.new_orders.iter().any(|o| o.order_id == order_id) {
            return Ok(true);
        }
        Ok(self.inner.read()?.orders.contains_key(order_id))
    }

    async fn insert_order(&mut self, order: &Order) -> AppResult<()> {
        if self.order_exists(&order.order_id).await? {
            return Err(AppError::DuplicateEntry("Order ID".to_string()));
        }
        self.new_orders.push(order.clone());
        Ok(())
    }

    async fn lock_order(&mut self, order_id: &str) -> AppResult<Option<Order>> {
        if let Some(order) = self.updated_orders.get(order_id) {
            return Ok(Some(order.clone()));
        }
        if let Some(order) = self.new_orders.iter().find(|o| o.order_id == order_id) {
            return Ok(Some(order.clone()));
        }

        let key = order_id.to_string();
        if !self.order_guards.contains_key(&key) {
            let guard = self
                .inner
                .order_locks
                .acquire(&key, self.inner.lock_timeout)
                .await?
                .ok_or_else(|| AppError::LockTimeout(format!("order {}", order_id)))?;
            self.order_guards.insert(key, guard);
        }

        Ok(self.inner.read()?.orders.get(order_id).cloned())
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        if let Some(staged) = self
            .new_orders
            .iter_mut()
            .find(|o| o.order_id == order.order_id)
        {
            *staged = order.clone();
            return Ok(());
        }
        if !self.order_guards.contains_key(&order.order_id) {
            return Err(AppError::Internal(format!(
                "order {} written without an exclusive hold",
                order.order_id
            )));
        }
        self.updated_orders
            .insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn commit(mut self) -> AppResult<()> {
        let mut state = self.inner.write()?;

        // A concurrent transaction may have committed the same order id since
        // this one staged it.
        if self
            .new_orders
            .iter()
            .any(|o| state.orders.contains_key(&o.order_id))
        {
            return Err(AppError::DuplicateEntry("Order ID".to_string()));
        }

        for product_id in self.saved_products.drain(..) {
            if let Some(product) = self.products.remove(&product_id) {
                state.products.insert(product_id, product);
            }
        }
        state.entries.append(&mut self.entries);
        for order in self.new_orders.drain(..) {
            state.orders.insert(order.order_id.clone(), order);
        }
        for (order_id, order) in self.updated_orders.drain() {
            state.orders.insert(order_id, order);
        }

        // Guards are released when `self` drops, after the state lock.
        drop(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idle_lock_slots_are_pruned() {
        let locks = KeyedLocks::<String>::new();
        let timeout = Duration::from_millis(50);

        for i in 0..100 {
            let guard = locks.acquire(&format!("PO-{i}"), timeout).await.unwrap();
            assert!(guard.is_some());
        }
        assert!(locks.len() <= 1);

        let held = locks.acquire(&"PO-held".to_string(), timeout).await.unwrap();
        let _other = locks.acquire(&"PO-other".to_string(), timeout).await.unwrap();
        assert_eq!(locks.len(), 2);

        // A held slot survives pruning and still excludes other holders.
        let blocked = locks.acquire(&"PO-held".to_string(), timeout).await.unwrap();
        assert!(blocked.is_none());

        drop(held);
        assert!(locks.acquire(&"PO-held".to_string(), timeout).await.unwrap().is_some());
    }
}
