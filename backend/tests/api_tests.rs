//! HTTP API tests
//!
//! Black-box tests through the router including:
//! - Bearer token authentication and capability errors
//! - Error body shape and status codes
//! - Stock, order, product and report endpoints

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::*;
use jsonwebtoken::{encode, EncodingKey, Header};
use ledger_server::create_app;
use ledger_server::middleware::Claims;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shared::{Actor, Order, OrderStatus, Product, StockOperationEntry};
use tower::ServiceExt;

fn token(actor: &Actor) -> String {
    encode(
        &Header::default(),
        &Claims::new(actor, 3600),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn app() -> Router {
    create_app(Harness::new().state)
}

async fn send(app: &Router, method: Method, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(actor)));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, code: &str) -> Product {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/products",
        Some(&admin()),
        Some(json!({
            "code": code,
            "name": format!("{} name", code),
            "purchase_price": "10.00",
            "sale_price": "15.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "connected");

    let (status, _) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/v1/products")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stock_in_and_out() {
    let app = app();
    let product = register(&app, "API-01").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock/in",
        Some(&operator()),
        Some(json!({ "product_id": product.id, "quantity": 10, "reason": "foo" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let entry: StockOperationEntry = serde_json::from_value(body).unwrap();
    assert_eq!(entry.quantity_after, 10);
    assert_eq!(entry.note.as_deref(), Some("foo"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock/out",
        Some(&cashier()),
        Some(json!({ "product_id": product.id, "quantity": 11 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/stock/operations?product_id={}", product.id),
        Some(&viewer()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn test_adjust_and_audit() {
    let app = app();
    let product = register(&app, "API-02").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock/adjust",
        Some(&admin()),
        Some(json!({ "product_id": product.id, "new_quantity": 25 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["delta"], 25);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/stock/audit/{}", product.id),
        Some(&admin()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["replayed_quantity"], 25);
}

#[tokio::test]
async fn test_validation_and_capability_errors() {
    let app = app();
    let product = register(&app, "API-03").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock/in",
        Some(&admin()),
        Some(json!({ "product_id": product.id, "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "quantity");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock/in",
        Some(&viewer()),
        Some(json!({ "product_id": product.id, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "forbidden");

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/stock/operations?kind=transfer",
        Some(&admin()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/v1/products/999", Some(&admin()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_disable_product() {
    let app = app();
    let product = register(&app, "API-04").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/products/{}", product.id),
        Some(&operator()),
        Some(json!({ "name": "Renamed", "low_threshold": 0, "high_threshold": 20 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["code"], "API-04");
    assert_eq!(body["high_threshold"], 20);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/products/{}", product.id),
        Some(&operator()),
        Some(json!({ "purchase_price": "1.005" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Only admins may disable.
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/products/{}", product.id),
        Some(&operator()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/products/{}", product.id),
        Some(&admin()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "disabled");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/stock/in",
        Some(&operator()),
        Some(json!({ "product_id": product.id, "quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/products/{}", product.id),
        Some(&viewer()),
        None,
    )
    .await;
    assert_eq!(body["status"], "disabled");
    assert_eq!(body["quantity"], 5);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/products/999", Some(&admin()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_lifecycle() {
    let app = app();
    let a = register(&app, "ORD-A").await;
    let b = register(&app, "ORD-B").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/orders",
        Some(&purchaser()),
        Some(json!({
            "order_id": "PO-API-1",
            "order_type": "purchase",
            "items": [
                { "product_id": a.id, "quantity": 3, "unit_price": "10.00" },
                { "product_id": b.id, "quantity": 2, "unit_price": "5.00" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let order: Order = serde_json::from_value(body).unwrap();
    assert_eq!(order.total_amount, Decimal::new(4000, 2));
    assert_eq!(order.status, OrderStatus::Completed);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/orders/PO-API-1/operations",
        Some(&admin()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/v1/orders/PO-API-1/status",
        Some(&operator()),
        Some(json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/orders/PO-API-1/status",
        Some(&operator()),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/orders",
        Some(&purchaser()),
        Some(json!({
            "order_id": "PO-API-1",
            "order_type": "purchase",
            "items": [{ "product_id": a.id, "quantity": 1, "unit_price": "1.00" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_ENTRY");

    let (status, body) = send(&app, Method::GET, "/api/v1/orders?order_type=purchase", Some(&viewer()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_items"], 1);
}

#[tokio::test]
async fn test_reports() {
    let app = app();
    register(&app, "REP-A").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/reports/inventory_alerts",
        Some(&viewer()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["low_stock_count"], 1);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/v1/reports/inventory_alerts",
        Some(&cashier()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/reports/daily_snapshot?date=2024-03-01",
        Some(&cashier()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/reports/inventory_alerts/latest",
        Some(&admin()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
}
