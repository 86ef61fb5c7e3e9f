//! Admin route handlers: dashboard, users and order management.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::{info, instrument};

use cartwheel_core::{OrderId, OrderStatus, UserId, UserRole};

use super::missing;
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAdmin;
use crate::models::analytics::DashboardStats;
use crate::models::order::Order;
use crate::models::user::User;
use crate::models::{Page, PageParams};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Body of `PUT /api/admin/users/{id}/role`.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// Body of `PUT /api/admin/orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Status filter of `GET /api/admin/orders`.
#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

/// Store-wide counters, cached briefly.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<DashboardStats>> {
    Ok(Json(state.dashboard_stats().await?))
}

/// Paginated user list.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<User>>> {
    let (users, total) = UserRepository::new(state.pool()).list(params).await?;
    Ok(Json(Page::new(users, params, total)))
}

/// Change another user's role.
#[instrument(skip_all, fields(admin_id = %admin.id, target_id = %id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> Result<Json<User>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_string(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await
        .map_err(missing("User"))?;

    info!(role = %user.role, "User role changed");

    Ok(Json(user))
}

/// Delete another user. Users with orders are kept.
#[instrument(skip_all, fields(admin_id = %admin.id, target_id = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
) -> Result<StatusCode> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    UserRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(missing("User"))?;

    info!("User deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// All orders, newest first, optionally filtered by status.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(filter): ApiQuery<OrderFilter>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<Order>>> {
    let page = OrderService::new(state.pool())
        .list_all(filter.status, params)
        .await?;
    Ok(Json(page))
}

/// Move an order along the fulfilment workflow.
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .update_status(id, body.status)
        .await?;
    Ok(Json(order))
}
