//! Order transaction tests
//!
//! Tests for order processing including:
//! - Totals and per-item ledger entries
//! - All-or-nothing rollback when any item fails
//! - Duplicate order ids and input validation
//! - The order status state machine

mod common;

use chrono::Utc;
use common::*;
use ledger_server::services::CreateOrder;
use ledger_server::store::{InventoryStore, OrderFilter, StockTx};
use ledger_server::AppError;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    OperationKind, Order, OrderItem, OrderStatus, OrderType, Pagination, ReasonCode,
};

fn item(product_id: i64, quantity: i64, unit_price: &str) -> OrderItem {
    OrderItem {
        product_id,
        quantity,
        unit_price: dec(unit_price),
    }
}

fn order(order_id: &str, order_type: OrderType, items: Vec<OrderItem>) -> CreateOrder {
    CreateOrder {
        order_id: order_id.to_string(),
        order_type,
        items,
    }
}

/// Persist a pending order directly through the store
async fn pending_order(h: &Harness, order_id: &str) -> Order {
    let now = Utc::now();
    let order = Order {
        order_id: order_id.to_string(),
        order_type: OrderType::Purchase,
        total_amount: Decimal::ZERO,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    let mut tx = h.store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.commit().await.unwrap();
    order
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_purchase_order_totals_and_entries() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        let b = h.product("B", "4.00", "6.00").await;

        let created = h
            .state
            .orders
            .create_order(
                &purchaser(),
                order(
                    "PO-1",
                    OrderType::Purchase,
                    vec![item(a.id, 3, "10.00"), item(b.id, 2, "5.00")],
                ),
            )
            .await
            .unwrap();

        assert_eq!(created.status, OrderStatus::Completed);
        assert_eq!(created.total_amount, dec("40.00"));

        let entries = h
            .state
            .orders
            .order_entries(&admin(), "PO-1")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].product_id, a.id);
        assert_eq!(entries[0].total_price, dec("30.00"));
        assert_eq!(entries[1].product_id, b.id);
        assert_eq!(entries[1].total_price, dec("10.00"));
        for entry in &entries {
            assert_eq!(entry.kind, OperationKind::In);
            assert_eq!(entry.reason, ReasonCode::Purchase);
            assert_eq!(entry.order_id.as_deref(), Some("PO-1"));
            assert_eq!(entry.note.as_deref(), Some("order PO-1"));
        }

        assert_eq!(h.quantity(a.id).await, 3);
        assert_eq!(h.quantity(b.id).await, 2);
    }

    #[tokio::test]
    async fn test_sale_order_decrements_stock() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        h.apply(a.id, OperationKind::In, 10).await.unwrap();

        let created = h
            .state
            .orders
            .create_order(
                &cashier(),
                order("SO-1", OrderType::Sale, vec![item(a.id, 4, "12.00")]),
            )
            .await
            .unwrap();

        assert_eq!(created.total_amount, dec("48.00"));
        assert_eq!(h.quantity(a.id).await, 6);

        let entries = h.store.entries_for_order("SO-1").await.unwrap();
        assert_eq!(entries[0].reason, ReasonCode::Sale);
        assert_eq!(entries[0].delta, -4);
    }

    #[tokio::test]
    async fn test_failing_item_rolls_back_whole_order() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        let b = h.product("B", "4.00", "6.00").await;
        let c = h.product("C", "4.00", "6.00").await;
        h.apply(a.id, OperationKind::In, 10).await.unwrap();
        h.apply(b.id, OperationKind::In, 1).await.unwrap();
        h.apply(c.id, OperationKind::In, 10).await.unwrap();

        let err = h
            .state
            .orders
            .create_order(
                &cashier(),
                order(
                    "SO-2",
                    OrderType::Sale,
                    vec![
                        item(a.id, 5, "12.00"),
                        item(b.id, 2, "6.00"),
                        item(c.id, 1, "6.00"),
                    ],
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { product_id, .. } if product_id == b.id));

        assert!(h.store.find_order("SO-2").await.unwrap().is_none());
        assert!(h.store.entries_for_order("SO-2").await.unwrap().is_empty());
        assert_eq!(h.quantity(a.id).await, 10);
        assert_eq!(h.quantity(b.id).await, 1);
        assert_eq!(h.quantity(c.id).await, 10);
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back_order() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;

        let err = h
            .state
            .orders
            .create_order(
                &purchaser(),
                order(
                    "PO-404",
                    OrderType::Purchase,
                    vec![item(a.id, 1, "1.00"), item(9_999, 1, "1.00")],
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(h.store.find_order("PO-404").await.unwrap().is_none());
        assert_eq!(h.quantity(a.id).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_order_id_is_conflict() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        let engine = &h.state.orders;

        engine
            .create_order(
                &purchaser(),
                order("PO-DUP", OrderType::Purchase, vec![item(a.id, 1, "1.00")]),
            )
            .await
            .unwrap();
        let err = engine
            .create_order(
                &purchaser(),
                order("PO-DUP", OrderType::Purchase, vec![item(a.id, 1, "1.00")]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DuplicateEntry(_)));
        assert_eq!(h.quantity(a.id).await, 1);
    }

    #[tokio::test]
    async fn test_order_input_validation() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        let engine = &h.state.orders;

        let cases = vec![
            order("", OrderType::Purchase, vec![item(a.id, 1, "1.00")]),
            order(&"X".repeat(51), OrderType::Purchase, vec![item(a.id, 1, "1.00")]),
            order("PO-E", OrderType::Purchase, vec![]),
            order("PO-Q", OrderType::Purchase, vec![item(a.id, 0, "1.00")]),
            order("PO-P", OrderType::Purchase, vec![item(a.id, 1, "-1.00")]),
        ];
        for input in cases {
            let err = engine.create_order(&purchaser(), input).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "got {:?}", err);
        }
    }

    #[tokio::test]
    async fn test_order_total_out_of_range_is_rejected() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        let b = h.product("B", "9.00", "12.00").await;

        // Valid prices and quantities whose total leaves the amount range.
        let input = order(
            "PO-BIG",
            OrderType::Purchase,
            vec![
                item(a.id, 60_000, "999999999999.99"),
                item(b.id, 60_000, "999999999999.99"),
            ],
        );
        match h.state.orders.create_order(&purchaser(), input).await {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "unit_price"),
            other => panic!("expected validation error, got {:?}", other),
        }

        assert!(h.store.find_order("PO-BIG").await.unwrap().is_none());
        assert_eq!(h.quantity(a.id).await, 0);
        assert_eq!(h.quantity(b.id).await, 0);
    }

    #[tokio::test]
    async fn test_order_price_precision_is_checked() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;

        let err = h
            .state
            .orders
            .create_order(
                &purchaser(),
                order("PO-CENT", OrderType::Purchase, vec![item(a.id, 3, "1.005")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_create_order_requires_capability() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;

        let err = h
            .state
            .orders
            .create_order(
                &viewer(),
                order("PO-V", OrderType::Purchase, vec![item(a.id, 1, "1.00")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_completed_order_cannot_go_back_to_processing() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        h.state
            .orders
            .create_order(
                &purchaser(),
                order("PO-T", OrderType::Purchase, vec![item(a.id, 1, "1.00")]),
            )
            .await
            .unwrap();

        let err = h
            .state
            .orders
            .transition_status(&operator(), "PO-T", OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_pending_order_transitions() {
        let h = Harness::new();
        pending_order(&h, "PO-P1").await;
        pending_order(&h, "PO-P2").await;
        let engine = &h.state.orders;

        let cancelled = engine
            .transition_status(&operator(), "PO-P1", OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(matches!(
            engine
                .transition_status(&operator(), "PO-P1", OrderStatus::Processing)
                .await,
            Err(AppError::InvalidStateTransition { .. })
        ));

        engine
            .transition_status(&admin(), "PO-P2", OrderStatus::Processing)
            .await
            .unwrap();
        let done = engine
            .transition_status(&admin(), "PO-P2", OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert_eq!(
            engine.get_order(&viewer(), "PO-P2").await.unwrap().status,
            OrderStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_transition_errors() {
        let h = Harness::new();
        pending_order(&h, "PO-X").await;
        let engine = &h.state.orders;

        assert!(matches!(
            engine
                .transition_status(&operator(), "MISSING", OrderStatus::Cancelled)
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            engine
                .transition_status(&cashier(), "PO-X", OrderStatus::Cancelled)
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            engine
                .transition_status(&operator(), "PO-X", OrderStatus::Completed)
                .await,
            Err(AppError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_orders_filters() {
        let h = Harness::new();
        let a = h.product("A", "9.00", "12.00").await;
        let engine = &h.state.orders;

        engine
            .create_order(
                &admin(),
                order("PO-100", OrderType::Purchase, vec![item(a.id, 5, "1.00")]),
            )
            .await
            .unwrap();
        engine
            .create_order(
                &admin(),
                order("SO-100", OrderType::Sale, vec![item(a.id, 1, "2.00")]),
            )
            .await
            .unwrap();

        let sales = engine
            .list_orders(
                &viewer(),
                &OrderFilter {
                    order_type: Some(OrderType::Sale),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(sales.pagination.total_items, 1);
        assert_eq!(sales.data[0].order_id, "SO-100");

        let by_keyword = engine
            .list_orders(
                &viewer(),
                &OrderFilter {
                    keyword: Some("po-".to_string()),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_keyword.pagination.total_items, 1);
        assert_eq!(by_keyword.data[0].order_id, "PO-100");

        assert!(matches!(
            engine.order_entries(&admin(), "NOPE").await,
            Err(AppError::NotFound(_))
        ));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Line items over three products with prices in cents
    fn items_strategy() -> impl Strategy<Value = Vec<(usize, i64, i64)>> {
        prop::collection::vec((0usize..3, 1i64..20, 0i64..10_000), 1..8)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Property: a purchase order's total is the sum of its entries'
        /// total prices, and each product grows by its ordered quantity
        #[test]
        fn prop_order_total_matches_entries(lines in items_strategy()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let h = Harness::new();
                let mut ids = Vec::new();
                for code in ["P0", "P1", "P2"] {
                    ids.push(h.product(code, "1.00", "2.00").await.id);
                }

                let items: Vec<OrderItem> = lines
                    .iter()
                    .map(|(idx, qty, cents)| OrderItem {
                        product_id: ids[*idx],
                        quantity: *qty,
                        unit_price: Decimal::new(*cents, 2),
                    })
                    .collect();

                let created = h
                    .state
                    .orders
                    .create_order(&admin(), order("PO-PROP", OrderType::Purchase, items.clone()))
                    .await
                    .unwrap();

                let entries = h.store.entries_for_order("PO-PROP").await.unwrap();
                assert_eq!(entries.len(), items.len());
                let entry_total: Decimal = entries.iter().map(|e| e.total_price).sum();
                assert_eq!(created.total_amount, entry_total);

                for (idx, id) in ids.iter().enumerate() {
                    let ordered: i64 = lines
                        .iter()
                        .filter(|(i, _, _)| *i == idx)
                        .map(|(_, q, _)| *q)
                        .sum();
                    assert_eq!(h.quantity(*id).await, ordered);
                }
            });
        }
    }
}
