//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//!
//! # Auth (register/login rate limited)
//! POST /api/auth/register
//! POST /api/auth/login
//! GET  /api/auth/me
//! PUT  /api/auth/me
//! PUT  /api/auth/password
//!
//! # Catalog (writes are admin only)
//! GET    /api/products
//! GET    /api/products/categories
//! POST   /api/products
//! GET    /api/products/{id}
//! PUT    /api/products/{id}
//! DELETE /api/products/{id}
//! POST   /api/products/{id}/images      - multipart, field `image`
//!
//! # Cart
//! GET    /api/cart
//! DELETE /api/cart
//! POST   /api/cart/items
//! PUT    /api/cart/items/{product_id}
//! DELETE /api/cart/items/{product_id}
//!
//! # Orders
//! POST /api/orders
//! GET  /api/orders
//! GET  /api/orders/{id}
//! POST /api/orders/{id}/cancel
//!
//! # Payment
//! POST /api/payment/create-intent
//! POST /api/payment/webhook             - Stripe, signature verified
//! GET  /api/payment/config
//!
//! # Admin
//! GET    /api/admin/dashboard
//! GET    /api/admin/users
//! PUT    /api/admin/users/{id}/role
//! DELETE /api/admin/users/{id}
//! GET    /api/admin/orders
//! PUT    /api/admin/orders/{id}/status
//!
//! # Analytics (admin)
//! GET /api/analytics/sales
//! GET /api/analytics/top-products
//! GET /api/analytics/categories
//! GET /api/analytics/order-status
//! ```

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod payment;
pub mod products;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post, put},
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Body limit for image uploads: the 5 MiB image plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = 6 * 1024 * 1024;

/// Map a repository error, turning `NotFound` into a 404 for `what`.
pub(crate) fn missing(what: &'static str) -> impl FnOnce(RepositoryError) -> AppError {
    move |err| match err {
        RepositoryError::NotFound => AppError::NotFound(format!("{what} not found")),
        RepositoryError::Conflict(msg) => AppError::Conflict(msg),
        other => AppError::Database(other),
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/password", put(auth::change_password))
        .merge(limited)
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/categories", get(products::categories))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route(
            "/{id}/images",
            post(products::upload_image)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT)),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove_item),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-intent", post(payment::create_intent))
        .route("/webhook", post(payment::webhook))
        .route("/config", get(payment::config))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::users))
        .route("/users/{id}", axum::routing::delete(admin::delete_user))
        .route("/users/{id}/role", put(admin::set_role))
        .route("/orders", get(admin::orders))
        .route("/orders/{id}/status", put(admin::update_order_status))
}

/// Create the analytics routes router.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/sales", get(analytics::sales))
        .route("/top-products", get(analytics::top_products))
        .route("/categories", get(analytics::categories))
        .route("/order-status", get(analytics::order_status))
}

/// All routes, without global middleware.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payment", payment_routes())
        .nest("/admin", admin_routes())
        .nest("/analytics", analytics_routes());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_maps_repository_errors() {
        assert!(matches!(
            missing("Product")(RepositoryError::NotFound),
            AppError::NotFound(msg) if msg == "Product not found"
        ));
        assert!(matches!(
            missing("User")(RepositoryError::Conflict("user has existing orders".to_string())),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            missing("User")(RepositoryError::DataCorruption("bad role".to_string())),
            AppError::Database(_)
        ));
    }
}
