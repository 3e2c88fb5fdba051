//! HTTP handlers for stock operations and the ledger

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{DateRange, OperationKind, PaginatedResponse, Pagination, StockOperationEntry};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::{LedgerAudit, StockRequest};
use crate::store::{InventoryStore, LedgerFilter};
use crate::AppState;

/// Body of `POST /stock/in` and `POST /stock/out`
#[derive(Debug, Deserialize, Validate)]
pub struct StockMovementRequest {
    #[validate(range(min = 1, message = "Product ID must be positive"))]
    pub product_id: i64,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i64,
    #[validate(length(max = 50, message = "Reason must be at most 50 characters"))]
    pub reason: Option<String>,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Order ID must be 1 to 50 characters"))]
    pub order_id: Option<String>,
    pub unit_price: Option<Decimal>,
}

impl StockMovementRequest {
    fn into_request(self, kind: OperationKind) -> StockRequest {
        StockRequest {
            product_id: self.product_id,
            kind,
            quantity: self.quantity,
            reason: self.reason,
            note: self.note,
            order_id: self.order_id,
            unit_price: self.unit_price,
        }
    }
}

/// Body of `POST /stock/adjust`
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockRequest {
    #[validate(range(min = 1, message = "Product ID must be positive"))]
    pub product_id: i64,
    #[validate(range(min = 0, message = "New quantity cannot be negative"))]
    pub new_quantity: i64,
    #[validate(length(max = 50, message = "Reason must be at most 50 characters"))]
    pub reason: Option<String>,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
    pub unit_price: Option<Decimal>,
}

/// Query parameters of `GET /stock/operations`
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub product_id: Option<i64>,
    pub kind: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

async fn apply<S: InventoryStore>(
    state: AppState<S>,
    current_user: CurrentUser,
    request: StockRequest,
) -> AppResult<Json<StockOperationEntry>> {
    let entry = state.ledger.apply(&current_user.0, request).await?;
    Ok(Json(entry))
}

/// Receive stock
pub async fn stock_in<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Json(input): Json<StockMovementRequest>,
) -> AppResult<Json<StockOperationEntry>> {
    input.validate()?;
    apply(state, current_user, input.into_request(OperationKind::In)).await
}

/// Issue stock
pub async fn stock_out<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Json(input): Json<StockMovementRequest>,
) -> AppResult<Json<StockOperationEntry>> {
    input.validate()?;
    apply(state, current_user, input.into_request(OperationKind::Out)).await
}

/// Set a product to an absolute quantity
pub async fn stock_adjust<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Json(input): Json<AdjustStockRequest>,
) -> AppResult<Json<StockOperationEntry>> {
    input.validate()?;
    let request = StockRequest {
        product_id: input.product_id,
        kind: OperationKind::Adjust,
        quantity: input.new_quantity,
        reason: input.reason,
        note: input.note,
        order_id: None,
        unit_price: input.unit_price,
    };
    apply(state, current_user, request).await
}

/// List ledger entries, newest first
pub async fn list_operations<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<PaginatedResponse<StockOperationEntry>>> {
    let filter = LedgerFilter {
        product_id: query.product_id,
        kind: query
            .kind
            .as_deref()
            .map(str::parse::<OperationKind>)
            .transpose()?,
        range: DateRange {
            start: query.start_date,
            end: query.end_date,
        },
        keyword: query.keyword,
    };
    let page = Pagination::new(query.page, query.per_page);

    let entries = state
        .ledger
        .query_ledger(&current_user.0, &filter, page)
        .await?;
    Ok(Json(entries))
}

/// Get one ledger entry
pub async fn get_operation<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(entry_id): Path<i64>,
) -> AppResult<Json<StockOperationEntry>> {
    let entry = state.ledger.get_entry(&current_user.0, entry_id).await?;
    Ok(Json(entry))
}

/// Replay a product's ledger against its stored quantity
pub async fn audit_product<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<LedgerAudit>> {
    let audit = state.ledger.audit(&current_user.0, product_id).await?;
    Ok(Json(audit))
}
