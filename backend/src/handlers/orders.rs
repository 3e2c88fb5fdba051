//! HTTP handlers for orders

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::{
    DateRange, Order, OrderItem, OrderStatus, OrderType, PaginatedResponse, Pagination,
    StockOperationEntry,
};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::CreateOrder;
use crate::store::{InventoryStore, OrderFilter};
use crate::AppState;

/// Body of `POST /orders`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 50, message = "Order ID must be 1 to 50 characters"))]
    pub order_id: String,
    pub order_type: String,
    #[validate(length(min = 1, message = "Items must be a non-empty list"))]
    pub items: Vec<OrderItem>,
}

/// Body of `PUT /orders/:id/status`
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Query parameters of `GET /orders`
#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub order_type: Option<String>,
    pub status: Option<String>,
    pub keyword: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Create an order and apply it to the ledger
pub async fn create_order<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderRequest>,
) -> AppResult<Json<Order>> {
    input.validate()?;
    let order_type: OrderType = input.order_type.parse()?;

    let order = state
        .orders
        .create_order(
            &current_user.0,
            CreateOrder {
                order_id: input.order_id,
                order_type,
                items: input.items,
            },
        )
        .await?;
    Ok(Json(order))
}

/// List orders
pub async fn list_orders<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    let filter = OrderFilter {
        order_type: query
            .order_type
            .as_deref()
            .map(str::parse::<OrderType>)
            .transpose()?,
        status: query
            .status
            .as_deref()
            .map(str::parse::<OrderStatus>)
            .transpose()?,
        range: DateRange {
            start: query.start_date,
            end: query.end_date,
        },
        keyword: query.keyword,
    };
    let page = Pagination::new(query.page, query.per_page);

    let orders = state
        .orders
        .list_orders(&current_user.0, &filter, page)
        .await?;
    Ok(Json(orders))
}

/// Get an order
pub async fn get_order<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.orders.get_order(&current_user.0, &order_id).await?;
    Ok(Json(order))
}

/// Ledger entries created by an order
pub async fn get_order_operations<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
) -> AppResult<Json<Vec<StockOperationEntry>>> {
    let entries = state
        .orders
        .order_entries(&current_user.0, &order_id)
        .await?;
    Ok(Json(entries))
}

/// Move an order to a new status
pub async fn update_order_status<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(order_id): Path<String>,
    Json(input): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    let next: OrderStatus = input.status.parse()?;
    let order = state
        .orders
        .transition_status(&current_user.0, &order_id, next)
        .await?;
    Ok(Json(order))
}
