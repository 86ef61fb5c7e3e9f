//! Order placement and lifecycle.

use std::collections::BTreeMap;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use cartwheel_core::{OrderId, OrderStatus, UserId};

use crate::db::orders::OrderWriteError;
use crate::db::{CartRepository, OrderRepository, RepositoryError};
use crate::models::order::{CreateOrderRequest, Order, OrderLineRequest};
use crate::models::{CurrentUser, Page, PageParams};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Stock or state check failed while writing.
    #[error(transparent)]
    Write(#[from] OrderWriteError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// No such order visible to the caller.
    #[error("order not found")]
    NotFound,

    /// Request failed validation.
    #[error("{0}")]
    Invalid(String),
}

/// Merge lines for the same product and reject non-positive quantities.
///
/// The result is sorted by product ID.
///
/// # Errors
///
/// Returns `OrderError::Invalid` for an empty list, a quantity below 1, or
/// a merged quantity that overflows.
pub fn merge_lines(lines: &[OrderLineRequest]) -> Result<Vec<OrderLineRequest>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::Invalid("order has no items".to_string()));
    }

    let mut merged: BTreeMap<_, i32> = BTreeMap::new();
    for line in lines {
        if line.quantity < 1 {
            return Err(OrderError::Invalid(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        let quantity = merged.entry(line.product_id).or_insert(0);
        *quantity = quantity
            .checked_add(line.quantity)
            .ok_or_else(|| OrderError::Invalid("quantity too large".to_string()))?;
    }

    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| OrderLineRequest {
            product_id,
            quantity,
        })
        .collect())
}

/// Order service.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
    carts: CartRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            carts: CartRepository::new(pool),
        }
    }

    /// Place an order from the request lines, or from the cart when the
    /// request has none. Ordering from the cart empties it.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Invalid` for bad input or an empty cart, and
    /// `OrderError::Write` when a product is missing or short on stock.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
    ) -> Result<Order, OrderError> {
        request
            .shipping_address
            .validate()
            .map_err(OrderError::Invalid)?;

        let from_cart = request.items.is_empty();
        let requested = if from_cart {
            self.carts.order_lines(user_id).await?
        } else {
            request.items
        };
        let lines = merge_lines(&requested)?;

        let order = self
            .orders
            .create(
                user_id,
                &lines,
                &request.shipping_address,
                request.payment_method,
                from_cart,
            )
            .await?;

        info!(
            order_id = %order.id,
            total = %order.totals.total_price,
            from_cart,
            "Order placed"
        );

        Ok(order)
    }

    /// Get an order the caller may see (their own, or any for admins).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist or is not visible.
    pub async fn get_for(&self, actor: &CurrentUser, id: OrderId) -> Result<Order, OrderError> {
        self.orders
            .get(id)
            .await?
            .filter(|order| actor.is_admin() || order.user_id == actor.id)
            .ok_or(OrderError::NotFound)
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` on database failure.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// All orders for admins, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` on database failure.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        params: PageParams,
    ) -> Result<Page<Order>, OrderError> {
        let (orders, total) = self.orders.list_all(status, params).await?;
        Ok(Page::new(orders, params, total))
    }

    /// Cancel an order and restore stock. Owners and admins only.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for orders the caller can't see, and
    /// `OrderError::Write` when the order is past the cancellable stage.
    #[instrument(skip(self, actor), fields(user_id = %actor.id, order_id = %id))]
    pub async fn cancel(&self, actor: &CurrentUser, id: OrderId) -> Result<Order, OrderError> {
        // Visibility check; the status check happens under the row lock
        self.get_for(actor, id).await?;

        let order = self.orders.cancel(id).await?;
        info!(payment_status = %order.payment_status, "Order cancelled");
        Ok(order)
    }

    /// Admin status change, enforcing the transition table.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Write` with `OrderNotFound` or `InvalidTransition`.
    #[instrument(skip(self), fields(order_id = %id, next = %next))]
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let order = self.orders.transition(id, next).await?;
        info!("Order status updated");
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwheel_core::ProductId;

    use super::*;

    fn line(product: i32, quantity: i32) -> OrderLineRequest {
        OrderLineRequest {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_merge_combines_duplicates_and_sorts() {
        let merged = merge_lines(&[line(3, 1), line(1, 2), line(3, 4)]).unwrap();
        let pairs: Vec<(i32, i32)> = merged
            .iter()
            .map(|l| (l.product_id.as_i32(), l.quantity))
            .collect();
        assert_eq!(pairs, vec![(1, 2), (3, 5)]);
    }

    #[test]
    fn test_merge_rejects_empty() {
        assert!(matches!(merge_lines(&[]), Err(OrderError::Invalid(_))));
    }

    #[test]
    fn test_merge_rejects_non_positive_quantity() {
        assert!(matches!(
            merge_lines(&[line(1, 1), line(2, 0)]),
            Err(OrderError::Invalid(_))
        ));
        assert!(matches!(
            merge_lines(&[line(1, -3)]),
            Err(OrderError::Invalid(_))
        ));
    }

    #[test]
    fn test_merge_rejects_overflow() {
        assert!(matches!(
            merge_lines(&[line(1, i32::MAX), line(1, 1)]),
            Err(OrderError::Invalid(_))
        ));
    }
}
