//! Cart route handlers. Every handler responds with the updated cart.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::{debug, instrument};

use cartwheel_core::{ProductId, UserId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::cart::CartView;
use crate::state::AppState;

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Body of `PUT /api/cart/items/{product_id}`.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

/// Reject a cart quantity the product can't cover.
fn check_stock(name: &str, stock: i32, quantity: i32) -> Result<()> {
    if quantity > stock {
        return Err(AppError::BadRequest(format!(
            "Only {stock} of {name} in stock"
        )));
    }
    Ok(())
}

async fn cart_view(state: &AppState, user_id: UserId) -> Result<Json<CartView>> {
    let lines = CartRepository::new(state.pool()).lines(user_id).await?;
    Ok(Json(CartView::from_lines(lines)))
}

/// Current cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    cart_view(&state, user.id).await
}

/// Add units of a product, merging with any existing line.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<CartView>> {
    if body.quantity < 1 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let product = ProductRepository::new(state.pool())
        .get_by_id(body.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let carts = CartRepository::new(state.pool());
    let cart_id = carts.get_or_create(user.id).await?;
    let quantity = carts
        .quantity_of(cart_id, product.id)
        .await?
        .saturating_add(body.quantity);
    check_stock(&product.name, product.stock, quantity)?;

    carts
        .set_quantity(cart_id, product.id, quantity)
        .await
        .map_err(super::missing("Product"))?;

    debug!(quantity, "Cart line updated");

    cart_view(&state, user.id).await
}

/// Set a line's quantity. Zero removes the line.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn set_quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    if body.quantity < 0 {
        return Err(AppError::BadRequest(
            "Quantity cannot be negative".to_string(),
        ));
    }

    let carts = CartRepository::new(state.pool());
    let cart_id = carts.get_or_create(user.id).await?;

    if body.quantity == 0 {
        match carts.remove_item(cart_id, product_id).await {
            Ok(()) | Err(RepositoryError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        return cart_view(&state, user.id).await;
    }

    let product = ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    check_stock(&product.name, product.stock, body.quantity)?;

    carts
        .set_quantity(cart_id, product_id, body.quantity)
        .await
        .map_err(super::missing("Product"))?;

    cart_view(&state, user.id).await
}

/// Remove a line.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<CartView>> {
    let carts = CartRepository::new(state.pool());
    let cart_id = carts.get_or_create(user.id).await?;
    carts
        .remove_item(cart_id, product_id)
        .await
        .map_err(super::missing("Cart item"))?;

    cart_view(&state, user.id).await
}

/// Empty the cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(Json(CartView::empty()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_stock() {
        assert!(check_stock("Lamp", 5, 5).is_ok());
        assert!(matches!(
            check_stock("Lamp", 5, 6),
            Err(AppError::BadRequest(msg)) if msg == "Only 5 of Lamp in stock"
        ));
    }

    #[test]
    fn test_add_item_quantity_defaults_to_one() {
        let body: AddItemRequest = serde_json::from_str(r#"{"product_id":3}"#).unwrap();
        assert_eq!(body.quantity, 1);
    }
}
