//! HTTP handlers for the product registry

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{PaginatedResponse, Pagination, Product, ProductStatus};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::{RegisterProduct, UpdateProduct};
use crate::store::{InventoryStore, ProductFilter};
use crate::AppState;

/// Body of `POST /products`
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterProductRequest {
    #[validate(length(min = 1, max = 50, message = "Product code must be 1 to 50 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "Product name must be 1 to 100 characters"))]
    pub name: String,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    #[validate(range(min = 0, message = "Low threshold cannot be negative"))]
    pub low_threshold: Option<i64>,
    #[validate(range(min = 0, message = "High threshold cannot be negative"))]
    pub high_threshold: Option<i64>,
}

/// Body of `PUT /products/:id`
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 100, message = "Product name must be 1 to 100 characters"))]
    pub name: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    #[validate(range(min = 0, message = "Low threshold cannot be negative"))]
    pub low_threshold: Option<i64>,
    #[validate(range(min = 0, message = "High threshold cannot be negative"))]
    pub high_threshold: Option<i64>,
    pub status: Option<String>,
}

/// Query parameters of `GET /products`
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub keyword: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Register a product
pub async fn register_product<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Json(input): Json<RegisterProductRequest>,
) -> AppResult<Json<Product>> {
    input.validate()?;

    let product = state
        .products
        .register(
            &current_user.0,
            RegisterProduct {
                code: input.code,
                name: input.name,
                purchase_price: input.purchase_price,
                sale_price: input.sale_price,
                low_threshold: input.low_threshold,
                high_threshold: input.high_threshold,
            },
        )
        .await?;
    Ok(Json(product))
}

/// List products
pub async fn list_products<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    let filter = ProductFilter {
        keyword: query.keyword,
        status: query
            .status
            .as_deref()
            .map(str::parse::<ProductStatus>)
            .transpose()?,
    };
    let page = Pagination::new(query.page, query.per_page);

    let products = state.products.list(&current_user.0, &filter, page).await?;
    Ok(Json(products))
}

/// Get a product
pub async fn get_product<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Product>> {
    let product = state.products.get(&current_user.0, product_id).await?;
    Ok(Json(product))
}

/// Edit a product's descriptive fields, thresholds or status
pub async fn update_product<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
    Json(input): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    input.validate()?;

    let changes = UpdateProduct {
        name: input.name,
        purchase_price: input.purchase_price,
        sale_price: input.sale_price,
        low_threshold: input.low_threshold,
        high_threshold: input.high_threshold,
        status: input
            .status
            .as_deref()
            .map(str::parse::<ProductStatus>)
            .transpose()?,
    };

    let product = state
        .products
        .update(&current_user.0, product_id, changes)
        .await?;
    Ok(Json(product))
}

/// Disable a product; its ledger history is kept
pub async fn disable_product<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Product>> {
    let product = state.products.disable(&current_user.0, product_id).await?;
    Ok(Json(product))
}
