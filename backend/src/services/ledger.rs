//! Stock ledger: the only writer of product quantity
//!
//! Every quantity change takes the product's exclusive hold, computes the
//! movement, re-derives the status and appends one immutable entry inside a
//! single transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    first_chain_break, replay_quantity, validate_price, Actor, Capability, NewStockEntry,
    OperationKind, PaginatedResponse, Pagination, ReasonCode, StockOperationEntry,
};

use super::authz::CapabilityCheck;
use crate::error::{AppError, AppResult};
use crate::store::{InventoryStore, LedgerFilter, StockTx};

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedger<S> {
    store: S,
    authz: Arc<dyn CapabilityCheck>,
}

/// A caller's request to move stock
#[derive(Debug, Clone)]
pub struct StockRequest {
    pub product_id: i64,
    pub kind: OperationKind,
    /// Units moved for `in`/`out`; the new absolute quantity for `adjust`
    pub quantity: i64,
    pub reason: Option<String>,
    pub note: Option<String>,
    pub order_id: Option<String>,
    pub unit_price: Option<Decimal>,
}

/// Result of replaying a product's ledger against its stored quantity
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerAudit {
    pub product_id: i64,
    pub quantity: i64,
    pub replayed_quantity: i64,
    pub entry_count: usize,
    /// First entry whose before/after does not chain onto its predecessor
    pub first_break: Option<i64>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.quantity == self.replayed_quantity && self.first_break.is_none()
    }
}

/// One movement staged inside an open transaction
pub(crate) struct StagedOperation {
    pub product_id: i64,
    pub kind: OperationKind,
    pub amount: i64,
    pub unit_price: Option<Decimal>,
    pub order_id: Option<String>,
    pub reason: ReasonCode,
    pub note: Option<String>,
}

/// Apply one movement to a product inside `tx`.
///
/// Takes (or reuses) the product's hold, so the read-modify-write below is
/// never interleaved with another writer of the same product.
pub(crate) async fn stage_operation<T: StockTx>(
    tx: &mut T,
    actor_id: i64,
    op: StagedOperation,
    at: DateTime<Utc>,
) -> AppResult<StockOperationEntry> {
    let mut product = tx.lock_product(op.product_id).await?;

    let movement = op
        .kind
        .movement(product.quantity, op.amount)
        .map_err(|e| AppError::from_stock_rule(product.id, e))?;

    let unit_price = op.unit_price.unwrap_or(if op.kind.uses_sale_price() {
        product.sale_price
    } else {
        product.purchase_price
    });
    let total_price = movement
        .total_price(unit_price)
        .map_err(|e| AppError::from_stock_rule(product.id, e))?;

    product.set_quantity(movement.after, at);
    tx.save_product(&product).await?;

    tx.append_entry(NewStockEntry {
        product_id: product.id,
        kind: op.kind,
        movement,
        unit_price,
        total_price,
        order_id: op.order_id,
        reason: op.reason,
        note: op.note,
        actor_id,
        created_at: at,
    })
    .await
}

impl<S: InventoryStore> StockLedger<S> {
    pub fn new(store: S, authz: Arc<dyn CapabilityCheck>) -> Self {
        Self { store, authz }
    }

    /// Apply a stock operation and return the committed ledger entry
    pub async fn apply(&self, actor: &Actor, request: StockRequest) -> AppResult<StockOperationEntry> {
        self.authz
            .check(actor, Capability::for_operation(request.kind))?;

        let product_id = request.product_id;
        let kind = request.kind;

        match self.apply_in_tx(actor, request).await {
            Ok(entry) => {
                tracing::info!(
                    entry_id = entry.id,
                    product_id,
                    kind = %kind,
                    delta = entry.delta,
                    quantity_after = entry.quantity_after,
                    user_id = actor.user_id,
                    "Stock operation committed"
                );
                Ok(entry)
            }
            Err(err) => {
                tracing::warn!(product_id, kind = %kind, error = %err, "Stock operation rejected");
                Err(err)
            }
        }
    }

    async fn apply_in_tx(&self, actor: &Actor, request: StockRequest) -> AppResult<StockOperationEntry> {
        if let Some(price) = request.unit_price {
            validate_price(price).map_err(|m| AppError::validation("unit_price", m))?;
        }

        let reason = ReasonCode::normalize(
            request.kind,
            request.reason.as_deref(),
            request.note.as_deref(),
        );

        let mut tx = self.store.begin().await?;

        if let Some(order_id) = &request.order_id {
            if !tx.order_exists(order_id).await? {
                return Err(AppError::NotFound(format!("Order {}", order_id)));
            }
        }

        let entry = stage_operation(
            &mut tx,
            actor.user_id,
            StagedOperation {
                product_id: request.product_id,
                kind: request.kind,
                amount: request.quantity,
                unit_price: request.unit_price,
                order_id: request.order_id,
                reason: reason.code,
                note: reason.note,
            },
            Utc::now(),
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Ledger entries matching `filter`, newest first
    pub async fn query_ledger(
        &self,
        actor: &Actor,
        filter: &LedgerFilter,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<StockOperationEntry>> {
        self.authz.check(actor, Capability::ViewLedger)?;

        let (entries, total) = self.store.query_entries(filter, page).await?;
        Ok(PaginatedResponse::new(entries, page, total))
    }

    pub async fn get_entry(&self, actor: &Actor, entry_id: i64) -> AppResult<StockOperationEntry> {
        self.authz.check(actor, Capability::ViewLedger)?;

        self.store
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stock operation {}", entry_id)))
    }

    /// Sum of the signed deltas of every entry of a product
    pub async fn replay_quantity(&self, product_id: i64) -> AppResult<i64> {
        let entries = self.store.entries_for_product(product_id).await?;
        Ok(replay_quantity(&entries))
    }

    /// Compare a product's stored quantity with its replayed ledger
    pub async fn audit(&self, actor: &Actor, product_id: i64) -> AppResult<LedgerAudit> {
        self.authz.check(actor, Capability::ViewLedger)?;

        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
        let entries = self.store.entries_for_product(product_id).await?;

        let audit = LedgerAudit {
            product_id,
            quantity: product.quantity,
            replayed_quantity: replay_quantity(&entries),
            entry_count: entries.len(),
            first_break: first_chain_break(&entries),
        };
        if !audit.is_consistent() {
            tracing::error!(
                product_id,
                quantity = audit.quantity,
                replayed = audit.replayed_quantity,
                first_break = ?audit.first_break,
                "Ledger does not replay to stored quantity"
            );
        }
        Ok(audit)
    }
}
