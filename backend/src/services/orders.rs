//! Order transaction engine
//!
//! An order and all of its ledger entries commit together or not at all.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    lock_order, order_total, validate_order_id, validate_order_items, Actor, Capability, Order,
    OrderItem, OrderStatus, OrderType, PaginatedResponse, Pagination, StockOperationEntry,
};

use super::authz::CapabilityCheck;
use super::ledger::{stage_operation, StagedOperation};
use crate::error::{AppError, AppResult};
use crate::store::{InventoryStore, OrderFilter, StockTx};

/// Order transaction engine
#[derive(Clone)]
pub struct OrderTransactionEngine<S> {
    store: S,
    authz: Arc<dyn CapabilityCheck>,
}

/// Input for creating an order
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: String,
    pub order_type: OrderType,
    pub items: Vec<OrderItem>,
}

impl<S: InventoryStore> OrderTransactionEngine<S> {
    pub fn new(store: S, authz: Arc<dyn CapabilityCheck>) -> Self {
        Self { store, authz }
    }

    /// Create an order and apply every line item to the ledger atomically
    pub async fn create_order(&self, actor: &Actor, input: CreateOrder) -> AppResult<Order> {
        self.authz.check(actor, Capability::CreateOrder)?;

        validate_order_id(&input.order_id).map_err(|m| AppError::validation("order_id", m))?;
        validate_order_items(&input.items).map_err(|m| AppError::validation("items", m))?;
        let total = order_total(&input.items)
            .ok_or_else(|| AppError::validation("unit_price", "Order total out of range"))?;

        if self.store.find_order(&input.order_id).await?.is_some() {
            return Err(AppError::DuplicateEntry("Order ID".to_string()));
        }

        match self.run_order(actor, &input, total).await {
            Ok(order) => {
                tracing::info!(
                    order_id = %order.order_id,
                    order_type = %order.order_type,
                    items = input.items.len(),
                    total = %order.total_amount,
                    user_id = actor.user_id,
                    "Order committed"
                );
                Ok(order)
            }
            Err(err) => {
                tracing::warn!(
                    order_id = %input.order_id,
                    order_type = %input.order_type,
                    error = %err,
                    "Order rolled back"
                );
                Err(err)
            }
        }
    }

    async fn run_order(&self, actor: &Actor, input: &CreateOrder, total: Decimal) -> AppResult<Order> {
        let now = Utc::now();
        let mut order = Order {
            order_id: input.order_id.clone(),
            order_type: input.order_type,
            total_amount: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_order(&order).await?;

        // Holds in ascending id order, so overlapping orders cannot deadlock.
        for product_id in lock_order(&input.items) {
            tx.lock_product(product_id).await?;
        }

        let kind = input.order_type.operation_kind();
        let note = format!("order {}", input.order_id);

        for item in &input.items {
            stage_operation(
                &mut tx,
                actor.user_id,
                StagedOperation {
                    product_id: item.product_id,
                    kind,
                    amount: item.quantity,
                    unit_price: Some(item.unit_price),
                    order_id: Some(input.order_id.clone()),
                    reason: input.order_type.reason(),
                    note: Some(note.clone()),
                },
                now,
            )
            .await?;
        }

        order.total_amount = total;
        order.status = OrderStatus::Completed;
        order.updated_at = Utc::now();
        tx.update_order(&order).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Move an order along its status state machine
    pub async fn transition_status(
        &self,
        actor: &Actor,
        order_id: &str,
        next: OrderStatus,
    ) -> AppResult<Order> {
        self.authz.check(actor, Capability::TransitionOrder)?;

        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))?;

        if !order.status.can_transition_to(next) {
            tracing::warn!(
                order_id,
                from = %order.status,
                to = %next,
                "Order status transition rejected"
            );
            return Err(AppError::InvalidStateTransition {
                from: order.status.to_string(),
                to: next.to_string(),
            });
        }

        let previous = order.status;
        order.status = next;
        order.updated_at = Utc::now();
        tx.update_order(&order).await?;
        tx.commit().await?;

        tracing::info!(order_id, from = %previous, to = %next, "Order status changed");
        Ok(order)
    }

    pub async fn get_order(&self, actor: &Actor, order_id: &str) -> AppResult<Order> {
        self.authz.check(actor, Capability::ViewOrders)?;

        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {}", order_id)))
    }

    pub async fn list_orders(
        &self,
        actor: &Actor,
        filter: &OrderFilter,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<Order>> {
        self.authz.check(actor, Capability::ViewOrders)?;

        let (orders, total) = self.store.list_orders(filter, page).await?;
        Ok(PaginatedResponse::new(orders, page, total))
    }

    /// Ledger entries created by an order, in the order they were applied
    pub async fn order_entries(
        &self,
        actor: &Actor,
        order_id: &str,
    ) -> AppResult<Vec<StockOperationEntry>> {
        self.authz.check(actor, Capability::ViewLedger)?;

        if self.store.find_order(order_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Order {}", order_id)));
        }
        self.store.entries_for_order(order_id).await
    }
}
