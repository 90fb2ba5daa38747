//! Order route handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use order_service_core::{Order, OrderId, OrderIdError};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query parameters for fetching an order.
#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub order_id: Option<String>,
}

/// Response body for a saved order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedResponse {
    pub status: String,
    pub order_id: OrderId,
}

/// Fetch an order by identifier.
#[instrument(skip(state))]
pub async fn show<R: OrderRepository>(
    State(state): State<AppState<R>>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Arc<Order>>> {
    let raw = query.order_id.ok_or(OrderIdError::Empty)?;
    let order_id = OrderId::parse(&raw)?;

    state
        .orders()
        .get_order(&order_id, state.deadline())
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("order"))
}

/// Save an order from a JSON body.
#[instrument(skip(state, payload))]
pub async fn create<R: OrderRepository>(
    State(state): State<AppState<R>>,
    payload: std::result::Result<Json<Order>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let Json(order) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let order_id = order.order_id.clone();

    state.orders().save_order(order, state.deadline()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            status: "created".to_string(),
            order_id,
        }),
    ))
}
