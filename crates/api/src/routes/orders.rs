//! Customer order route handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::instrument;

use cartwheel_core::OrderId;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::order::{CreateOrderRequest, Order};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Place an order from explicit lines or the cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse> {
    let order = OrderService::new(state.pool()).create(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's orders, newest first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderService::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// One order, visible to its owner and admins.
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool()).get_for(&user, id).await?;
    Ok(Json(order))
}

/// Cancel an order and restore its stock.
#[instrument(skip_all, fields(user_id = %user.id, order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool()).cancel(&user, id).await?;
    Ok(Json(order))
}
