//! HTTP route handlers for the order service.
//!
//! # Route Structure
//!
//! ```text
//! # Browser UI (app_routes only)
//! GET  /                       - Order lookup page (index.html)
//! GET  /script.js, /styles.css - Page assets
//!
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (store answers queries)
//!
//! # Orders
//! GET  /api/order?order_id=ID  - Fetch an order (cache, then store)
//! POST /api/order              - Save an order (store, then cache)
//! ```

pub mod orders;

use std::path::Path;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use tower_http::services::ServeDir;

use crate::db::OrderRepository;
use crate::state::AppState;

/// Create the order API router.
pub fn order_routes<R: OrderRepository>() -> Router<AppState<R>> {
    Router::new().route("/order", get(orders::show::<R>).post(orders::create::<R>))
}

/// Create all routes for the order service.
pub fn routes<R: OrderRepository>() -> Router<AppState<R>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<R>))
        .nest("/api", order_routes())
}

/// Create all routes plus the browser UI.
///
/// Paths the API does not claim are served from `static_dir`; `/` resolves to
/// its `index.html`.
pub fn app_routes<R: OrderRepository>(static_dir: impl AsRef<Path>) -> Router<AppState<R>> {
    routes().fallback_service(ServeDir::new(static_dir))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<R: OrderRepository>(State(state): State<AppState<R>>) -> StatusCode {
    match state.orders().repository().ping().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
