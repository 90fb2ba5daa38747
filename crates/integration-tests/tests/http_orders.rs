//! Integration tests for the order HTTP API.
//!
//! The router runs against the in-memory repository, so these tests need no
//! database. Store failures and latency are injected through the repository.

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use order_service::cache::OrderCache;
use order_service::db::{MemoryOrderRepository, SaveStep};
use order_service::routes;
use order_service::service::OrderService;
use order_service::state::AppState;
use order_service_core::Order;
use order_service_integration_tests::sample_order;
use serde_json::{Value, json};
use tower::ServiceExt;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn app() -> (Router, OrderService<MemoryOrderRepository>) {
    let orders = OrderService::new(MemoryOrderRepository::new(), OrderCache::new());
    let router = routes::routes().with_state(AppState::new(orders.clone(), REQUEST_TIMEOUT));
    (router, orders)
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: &Router, body: String) -> Response {
    app.clone()
        .oneshot(
            Request::post("/api/order")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// Health Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_reflects_store() {
    let (app, orders) = app();
    assert_eq!(get(&app, "/health/ready").await.status(), StatusCode::OK);

    orders.repository().fail_lookups(true);
    assert_eq!(
        get(&app, "/health/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

// =============================================================================
// Create Tests
// =============================================================================

#[tokio::test]
async fn test_create_then_get() {
    let (app, orders) = app();
    let order = sample_order("b563feb7b2b84b6test");

    let response = post_json(&app, serde_json::to_string(&order).unwrap()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        body,
        json!({"status": "created", "order_id": "b563feb7b2b84b6test"})
    );
    assert_eq!(orders.repository().order_count(), 1);
    assert!(orders.cache().get(&order.order_id).is_some());

    let response = get(&app, "/api/order?order_id=b563feb7b2b84b6test").await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Order = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(fetched, order);
}

#[tokio::test]
async fn test_create_accepts_numeric_money_and_defaults_currency() {
    let (app, _) = app();
    let body = json!({
        "order_id": "b563feb7b2b84b6test",
        "client_id": 42,
        "locale": "en",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "email": "test@gmail.com",
            "type": "courier",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15"
        },
        "payment": {
            "transaction_id": "b563feb7b2b84b6test",
            "provider": "wbpay",
            "amount": 1817,
            "date_pay": 1_637_907_727,
            "bank": "alpha"
        },
        "items": [
            {"product_id": 9_934_930, "name": "Mascaras", "brand": "Vivienne Sabo", "price": 453, "size": "0", "quantity": 1}
        ]
    });

    let response = post_json(&app, body.to_string()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = get(&app, "/api/order?order_id=b563feb7b2b84b6test").await;
    let fetched: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(fetched["payment"]["currency"], "RUB");
    assert_eq!(fetched["delivery"]["type"], "courier");
    assert_eq!(fetched["items"][0]["quantity"], 1);
}

#[tokio::test]
async fn test_create_rejects_malformed_body() {
    let (app, orders) = app();
    let response = post_json(&app, "{not json".to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(orders.repository().order_count(), 0);
}

#[tokio::test]
async fn test_create_rejects_missing_order_id() {
    let (app, orders) = app();
    let response = post_json(&app, json!({"client_id": 1}).to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(&app, json!({"order_id": "  "}).to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(orders.repository().order_count(), 0);
}

#[tokio::test]
async fn test_create_store_failure_is_server_error() {
    let (app, orders) = app();
    orders.repository().fail_saves_at(Some(SaveStep::Payment));

    let order = sample_order("O1");
    let response = post_json(&app, serde_json::to_string(&order).unwrap()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Internal server error");
    assert!(orders.cache().get(&order.order_id).is_none());
}

// =============================================================================
// Fetch Tests
// =============================================================================

#[tokio::test]
async fn test_get_requires_order_id() {
    let (app, _) = app();
    assert_eq!(get(&app, "/api/order").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get(&app, "/api/order?order_id=").await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_get_unknown_order_is_not_found() {
    let (app, orders) = app();
    let response = get(&app, "/api/order?order_id=missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "order not found");
    assert!(orders.cache().is_empty());
}

#[tokio::test]
async fn test_get_lookup_failure_is_not_reported_as_missing() {
    let (app, orders) = app();
    orders.repository().fail_lookups(true);

    let response = get(&app, "/api/order?order_id=O1").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(start_paused = true)]
async fn test_get_deadline_is_gateway_timeout() {
    let (app, orders) = app();
    orders.repository().set_latency(REQUEST_TIMEOUT * 2);

    let response = get(&app, "/api/order?order_id=O1").await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_get_served_from_cache_when_store_fails() {
    let (app, orders) = app();
    let order = sample_order("O1");
    post_json(&app, serde_json::to_string(&order).unwrap()).await;

    orders.repository().fail_lookups(true);
    let response = get(&app, "/api/order?order_id=O1").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Browser UI Tests
// =============================================================================

const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../service/static");

fn ui_app() -> Router {
    let orders = OrderService::new(MemoryOrderRepository::new(), OrderCache::new());
    routes::app_routes(STATIC_DIR).with_state(AppState::new(orders, REQUEST_TIMEOUT))
}

#[tokio::test]
async fn test_root_serves_order_page() {
    let app = ui_app();

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    let page = body_text(response).await;
    assert!(page.contains(r#"<script src="/script.js">"#));
    assert!(page.contains(r#"href="/styles.css""#));
}

#[tokio::test]
async fn test_page_assets_are_served() {
    let app = ui_app();

    let script = get(&app, "/script.js").await;
    assert_eq!(script.status(), StatusCode::OK);
    assert!(body_text(script).await.contains("/api/order"));

    let styles = get(&app, "/styles.css").await;
    assert_eq!(styles.status(), StatusCode::OK);

    assert_eq!(get(&app, "/missing.js").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_takes_precedence_over_static_files() {
    let app = ui_app();
    let order = sample_order("O1");

    let response = post_json(&app, serde_json::to_string(&order).unwrap()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = get(&app, "/api/order?order_id=O1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["payment"]["amount"].is_number());
    assert_eq!(get(&app, "/health").await.status(), StatusCode::OK);
}
