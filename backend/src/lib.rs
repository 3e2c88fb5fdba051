//! Stock ledger service
//!
//! Tracks product quantities through an append-only ledger, applies
//! purchase/sale orders as single transactions and keeps daily snapshots and
//! inventory alerts up to date in the background.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};

use middleware::TokenVerifier;
use services::{
    CapabilityCheck, OrderTransactionEngine, ProductRegistry, Reconciliation, RoleCapabilities,
    StockLedger,
};
use store::InventoryStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub ledger: StockLedger<S>,
    pub orders: OrderTransactionEngine<S>,
    pub products: ProductRegistry<S>,
    pub reconciliation: Reconciliation<S>,
    pub verifier: TokenVerifier,
    pub config: Arc<Config>,
}

impl<S: InventoryStore> AppState<S> {
    /// Wire every service to `store` with the static role table
    pub fn new(store: S, config: Config) -> Self {
        Self::with_capabilities(store, config, Arc::new(RoleCapabilities))
    }

    pub fn with_capabilities(store: S, config: Config, authz: Arc<dyn CapabilityCheck>) -> Self {
        Self {
            ledger: StockLedger::new(store.clone(), authz.clone()),
            orders: OrderTransactionEngine::new(store.clone(), authz.clone()),
            products: ProductRegistry::new(store.clone(), authz.clone()),
            reconciliation: Reconciliation::new(store.clone(), authz),
            verifier: TokenVerifier::new(&config.jwt.secret),
            config: Arc::new(config),
            store,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app<S: InventoryStore>(state: AppState<S>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check::<S>))
        .nest("/api/v1", routes::api_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Stock Ledger API v1.0"
}
