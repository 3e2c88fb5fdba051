//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::time::Duration;

use ledger_server::config::{
    Config, DatabaseConfig, JwtConfig, LoggingConfig, SchedulerConfig, ServerConfig, StoreBackend,
    StoreConfig,
};
use ledger_server::services::{RegisterProduct, StockRequest};
use ledger_server::store::MemoryStore;
use ledger_server::AppState;
use rust_decimal::Decimal;
use shared::{Actor, OperationKind, Product, Role, StockOperationEntry};

pub const JWT_SECRET: &str = "test-secret";

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn admin() -> Actor {
    Actor::new(1, Role::Admin)
}

pub fn operator() -> Actor {
    Actor::new(2, Role::StockOperator)
}

pub fn cashier() -> Actor {
    Actor::new(3, Role::Cashier)
}

pub fn purchaser() -> Actor {
    Actor::new(4, Role::Purchaser)
}

pub fn viewer() -> Actor {
    Actor::new(5, Role::Viewer)
}

pub fn test_config(lock_timeout: Duration) -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://localhost/unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout_secs: 1,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            lock_timeout_ms: lock_timeout.as_millis() as u64,
        },
        scheduler: SchedulerConfig {
            enabled: false,
            snapshot_interval_secs: 1,
            alert_interval_secs: 1,
        },
        logging: LoggingConfig { json: false },
    }
}

/// Memory store plus every service wired to it
pub struct Harness {
    pub store: MemoryStore,
    pub state: AppState<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_secs(2))
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        let store = MemoryStore::new(lock_timeout);
        let state = AppState::new(store.clone(), test_config(lock_timeout));
        Self { store, state }
    }

    /// Register a product with thresholds 10/1000
    pub async fn product(&self, code: &str, purchase_price: &str, sale_price: &str) -> Product {
        self.product_with_thresholds(code, purchase_price, sale_price, 10, 1000)
            .await
    }

    pub async fn product_with_thresholds(
        &self,
        code: &str,
        purchase_price: &str,
        sale_price: &str,
        low: i64,
        high: i64,
    ) -> Product {
        self.state
            .products
            .register(
                &admin(),
                RegisterProduct {
                    code: code.to_string(),
                    name: format!("{} name", code),
                    purchase_price: dec(purchase_price),
                    sale_price: dec(sale_price),
                    low_threshold: Some(low),
                    high_threshold: Some(high),
                },
            )
            .await
            .unwrap()
    }

    pub async fn apply(
        &self,
        product_id: i64,
        kind: OperationKind,
        quantity: i64,
    ) -> ledger_server::AppResult<StockOperationEntry> {
        self.state
            .ledger
            .apply(&admin(), request(product_id, kind, quantity))
            .await
    }

    pub async fn quantity(&self, product_id: i64) -> i64 {
        self.state
            .products
            .get(&admin(), product_id)
            .await
            .unwrap()
            .quantity
    }
}

pub fn request(product_id: i64, kind: OperationKind, quantity: i64) -> StockRequest {
    StockRequest {
        product_id,
        kind,
        quantity,
        reason: None,
        note: None,
        order_id: None,
        unit_price: None,
    }
}
