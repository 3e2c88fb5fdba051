//! Route definitions for the stock ledger service

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, store::InventoryStore, AppState};

/// Create API routes
pub fn api_routes<S: InventoryStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let protected = Router::new()
        .nest("/stock", stock_routes())
        .nest("/orders", order_routes())
        .nest("/products", product_routes())
        .nest("/reports", report_routes())
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            auth_middleware,
        ));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check::<S>))
        .merge(protected)
}

/// Stock operation and ledger routes (protected)
fn stock_routes<S: InventoryStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/in", post(handlers::stock_in::<S>))
        .route("/out", post(handlers::stock_out::<S>))
        .route("/adjust", post(handlers::stock_adjust::<S>))
        .route("/operations", get(handlers::list_operations::<S>))
        .route("/operations/:entry_id", get(handlers::get_operation::<S>))
        .route("/audit/:product_id", get(handlers::audit_product::<S>))
}

/// Order routes (protected)
fn order_routes<S: InventoryStore>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/",
            get(handlers::list_orders::<S>).post(handlers::create_order::<S>),
        )
        .route("/:order_id", get(handlers::get_order::<S>))
        .route(
            "/:order_id/operations",
            get(handlers::get_order_operations::<S>),
        )
        .route("/:order_id/status", put(handlers::update_order_status::<S>))
}

/// Product registry routes (protected)
fn product_routes<S: InventoryStore>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products::<S>).post(handlers::register_product::<S>),
        )
        .route(
            "/:product_id",
            get(handlers::get_product::<S>)
                .put(handlers::update_product::<S>)
                .delete(handlers::disable_product::<S>),
        )
}

/// Report routes (protected)
fn report_routes<S: InventoryStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/daily_snapshot", get(handlers::get_daily_snapshot::<S>))
        .route("/inventory_alerts", get(handlers::get_inventory_alerts::<S>))
        .route(
            "/inventory_alerts/latest",
            get(handlers::get_latest_alerts::<S>),
        )
}
