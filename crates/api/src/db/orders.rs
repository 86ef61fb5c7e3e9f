//! Order repository.
//!
//! Writes that touch stock (placing and cancelling orders) run in a single
//! transaction and lock the affected product rows with `SELECT ... FOR UPDATE`,
//! so concurrent orders can never drive stock below zero.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use cartwheel_core::{
    LineItem, OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus,
    ProductId, UserId,
};

use super::RepositoryError;
use crate::models::PageParams;
use crate::models::order::{Order, OrderItem, OrderLineRequest, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, shipping_address, payment_method, payment_status, \
                             payment_intent_id, items_price, shipping_price, tax_price, \
                             total_price, status, paid_at, delivered_at, cancelled_at, \
                             created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, name, image, price, quantity";

/// Errors from order writes that validate state under a row lock.
#[derive(Debug, Error)]
pub enum OrderWriteError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The order does not exist.
    #[error("order not found")]
    OrderNotFound,

    /// A requested product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Not enough units in stock.
    #[error("insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        name: String,
        available: i32,
        requested: i32,
    },

    /// The order has no lines.
    #[error("order has no items")]
    Empty,

    /// The status change is not allowed from the current status.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Database row for `orders`.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    shipping_address: Json<ShippingAddress>,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_intent_id: Option<String>,
    items_price: Decimal,
    shipping_price: Decimal,
    tax_price: Decimal,
    total_price: Decimal,
    status: OrderStatus,
    paid_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address.0,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            payment_intent_id: self.payment_intent_id,
            totals: OrderTotals {
                items_price: self.items_price,
                shipping_price: self.shipping_price,
                tax_price: self.tax_price,
                total_price: self.total_price,
            },
            status: self.status,
            paid_at: self.paid_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Database row for `order_items`.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    name: String,
    image: Option<String>,
    price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            image: row.image,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

/// A locked product row read while placing an order.
#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    name: String,
    price: Decimal,
    stock: i32,
    image: Option<String>,
}

/// Lock an order row for the rest of the transaction.
async fn lock_order(conn: &mut PgConnection, id: OrderId) -> Result<OrderRow, OrderWriteError> {
    sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(OrderWriteError::OrderNotFound)
}

async fn items_for(conn: &mut PgConnection, id: OrderId) -> Result<Vec<OrderItem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
    ))
    .bind(id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// Put each line's quantity back into stock. Deleted products are skipped.
async fn restore_stock(conn: &mut PgConnection, id: OrderId) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE products p
        SET stock = p.stock + restored.quantity, updated_at = NOW()
        FROM (
            SELECT product_id, SUM(quantity)::INTEGER AS quantity
            FROM order_items
            WHERE order_id = $1 AND product_id IS NOT NULL
            GROUP BY product_id
        ) AS restored
        WHERE p.id = restored.product_id
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Take ordered quantities out of the user's cart.
///
/// Only the ordered products are touched. A line whose quantity grew after
/// the cart was read keeps the difference.
async fn remove_from_cart(
    conn: &mut PgConnection,
    user_id: UserId,
    lines: &[OrderLineRequest],
) -> Result<(), sqlx::Error> {
    let product_ids: Vec<i32> = lines.iter().map(|l| l.product_id.as_i32()).collect();
    let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();

    sqlx::query(
        r"
        DELETE FROM cart_items ci
        USING carts c, UNNEST($2::INTEGER[], $3::INTEGER[]) AS ordered (product_id, quantity)
        WHERE ci.cart_id = c.id AND c.user_id = $1
          AND ci.product_id = ordered.product_id
          AND ci.quantity <= ordered.quantity
        ",
    )
    .bind(user_id)
    .bind(&product_ids)
    .bind(&quantities)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE cart_items ci
        SET quantity = ci.quantity - ordered.quantity
        FROM carts c, UNNEST($2::INTEGER[], $3::INTEGER[]) AS ordered (product_id, quantity)
        WHERE ci.cart_id = c.id AND c.user_id = $1
          AND ci.product_id = ordered.product_id
        ",
    )
    .bind(user_id)
    .bind(&product_ids)
    .bind(&quantities)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Status update applied while the order row is locked.
async fn write_status(
    conn: &mut PgConnection,
    id: OrderId,
    next: OrderStatus,
    payment_status: PaymentStatus,
) -> Result<OrderRow, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(&format!(
        r"
        UPDATE orders
        SET status = $2,
            payment_status = $3,
            paid_at = CASE WHEN $3 = 'paid' AND paid_at IS NULL THEN NOW() ELSE paid_at END,
            delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END,
            cancelled_at = CASE WHEN $2 = 'cancelled' THEN NOW() ELSE cancelled_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(next)
    .bind(payment_status)
    .fetch_one(conn)
    .await
}

/// Payment status an order ends up with after moving to `next`.
///
/// Cancelling a paid order records a refund; delivering a cash on delivery
/// order records payment.
fn payment_status_after(
    next: OrderStatus,
    method: PaymentMethod,
    current: PaymentStatus,
) -> PaymentStatus {
    match (next, method, current) {
        (OrderStatus::Cancelled, _, PaymentStatus::Paid) => PaymentStatus::Refunded,
        (OrderStatus::Delivered, PaymentMethod::CashOnDelivery, _) => PaymentStatus::Paid,
        _ => current,
    }
}

/// Outcome of applying a payment provider event to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentUpdate {
    /// The payment status changed.
    Applied,
    /// The order already carries a settled payment status.
    Unchanged,
    /// The order was cancelled; payment events no longer apply.
    OrderCancelled,
}

/// Decide how a payment event affects an order in its current state.
///
/// A refund is final: a late success never turns it back into a payment.
fn payment_update(status: OrderStatus, payment: PaymentStatus, succeeded: bool) -> PaymentUpdate {
    if status == OrderStatus::Cancelled {
        return PaymentUpdate::OrderCancelled;
    }
    let settled = if succeeded {
        matches!(payment, PaymentStatus::Paid | PaymentStatus::Refunded)
    } else {
        matches!(
            payment,
            PaymentStatus::Paid | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    };
    if settled {
        PaymentUpdate::Unchanged
    } else {
        PaymentUpdate::Applied
    }
}

fn locked_read_error(err: OrderWriteError) -> RepositoryError {
    match err {
        OrderWriteError::Database(e) => RepositoryError::Database(e),
        _ => RepositoryError::NotFound,
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order: lock products, check and decrement stock, insert the
    /// order with price snapshots and optionally take the lines out of the cart.
    ///
    /// Lines must already be merged by product.
    ///
    /// # Errors
    ///
    /// Returns `OrderWriteError::ProductNotFound` or `InsufficientStock` when a
    /// line cannot be fulfilled; nothing is written in that case.
    pub async fn create(
        &self,
        user_id: UserId,
        lines: &[OrderLineRequest],
        shipping_address: &ShippingAddress,
        payment_method: PaymentMethod,
        clear_cart: bool,
    ) -> Result<Order, OrderWriteError> {
        if lines.is_empty() {
            return Err(OrderWriteError::Empty);
        }

        // Lock in product ID order so concurrent orders cannot deadlock
        let mut lines = lines.to_vec();
        lines.sort_by_key(|line| line.product_id);

        let mut tx = self.pool.begin().await?;

        let mut snapshots = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = sqlx::query_as::<_, LockedProduct>(
                "SELECT name, price, stock, images[1] AS image FROM products WHERE id = $1 FOR UPDATE",
            )
            .bind(line.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(OrderWriteError::ProductNotFound(line.product_id))?;

            if product.stock < line.quantity {
                return Err(OrderWriteError::InsufficientStock {
                    name: product.name,
                    available: product.stock,
                    requested: line.quantity,
                });
            }

            sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
                .bind(line.product_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;

            snapshots.push((line.product_id, line.quantity, product));
        }

        let line_items: Vec<LineItem> = snapshots
            .iter()
            .map(|(_, quantity, product)| LineItem::new(product.price, *quantity))
            .collect();
        let totals = OrderTotals::compute(&line_items);

        let order = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, shipping_address, payment_method,
                                items_price, shipping_price, tax_price, total_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(Json(shipping_address))
        .bind(payment_method)
        .bind(totals.items_price)
        .bind(totals.shipping_price)
        .bind(totals.tax_price)
        .bind(totals.total_price)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(snapshots.len());
        for (product_id, quantity, product) in snapshots {
            let row = sqlx::query_as::<_, OrderItemRow>(&format!(
                r"
                INSERT INTO order_items (order_id, product_id, name, image, price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ITEM_COLUMNS}
                "
            ))
            .bind(order.id)
            .bind(product_id)
            .bind(&product.name)
            .bind(product.image.as_deref())
            .bind(product.price)
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::from(row));
        }

        if clear_cart {
            remove_from_cart(&mut tx, user_id, &lines).await?;
        }

        tx.commit().await?;

        Ok(order.into_order(items))
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let mut conn = self.pool.acquire().await?;
        let items = items_for(&mut conn, id).await?;
        Ok(Some(row.into_order(items)))
    }

    /// Find the order a payment intent was created for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderId>(
            "SELECT id FROM orders WHERE payment_intent_id = $1",
        )
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.attach_items(rows).await
    }

    /// All orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        params: PageParams,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        if let Some(status) = status {
            count_query.push(" WHERE status = ").push_bind(status);
            query.push(" WHERE status = ").push_bind(status);
        }
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(params.limit()))
            .push(" OFFSET ")
            .push_bind(params.offset());

        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;
        let rows: Vec<OrderRow> = query.build_query_as().fetch_all(self.pool).await?;

        Ok((self.attach_items(rows).await?, total))
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            by_order.entry(row.order_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }

    /// Cancel an order and restore its stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderWriteError::InvalidTransition` unless the order is
    /// pending or confirmed.
    pub async fn cancel(&self, id: OrderId) -> Result<Order, OrderWriteError> {
        self.transition(id, OrderStatus::Cancelled).await
    }

    /// Move an order to a new status, enforcing the transition table.
    ///
    /// Cancelling restores stock. A paid order that is cancelled is marked
    /// refunded; a cash on delivery order that is delivered is marked paid.
    ///
    /// # Errors
    ///
    /// Returns `OrderWriteError::OrderNotFound` or `InvalidTransition`.
    pub async fn transition(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, OrderWriteError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order(&mut tx, id).await?;
        if !current.status.can_transition_to(next) {
            return Err(OrderWriteError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        if next == OrderStatus::Cancelled {
            restore_stock(&mut tx, id).await?;
        }

        let payment_status =
            payment_status_after(next, current.payment_method, current.payment_status);
        let row = write_status(&mut tx, id, next, payment_status).await?;
        let items = items_for(&mut tx, id).await?;

        tx.commit().await?;

        Ok(row.into_order(items))
    }

    /// Record the payment intent created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_intent_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(payment_intent_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "payment intent already recorded"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark an order paid. A pending order becomes confirmed.
    ///
    /// Paid, refunded and cancelled orders are left unchanged, so repeated
    /// deliveries of the same event are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<PaymentUpdate, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = lock_order(&mut tx, id).await.map_err(locked_read_error)?;

        let update = payment_update(current.status, current.payment_status, true);
        if update == PaymentUpdate::Applied {
            sqlx::query(
                r"
                UPDATE orders
                SET payment_status = 'paid',
                    paid_at = NOW(),
                    payment_intent_id = COALESCE(payment_intent_id, $2),
                    status = CASE WHEN status = 'pending' THEN 'confirmed'::order_status ELSE status END,
                    updated_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(payment_intent_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(update)
    }

    /// Mark an order's payment failed unless it is already settled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn mark_payment_failed(&self, id: OrderId) -> Result<PaymentUpdate, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = lock_order(&mut tx, id).await.map_err(locked_read_error)?;

        let update = payment_update(current.status, current.payment_status, false);
        if update == PaymentUpdate::Applied {
            sqlx::query(
                "UPDATE orders SET payment_status = 'failed', updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelling_paid_order_records_refund() {
        assert_eq!(
            payment_status_after(OrderStatus::Cancelled, PaymentMethod::Card, PaymentStatus::Paid),
            PaymentStatus::Refunded
        );
        assert_eq!(
            payment_status_after(
                OrderStatus::Cancelled,
                PaymentMethod::Card,
                PaymentStatus::Pending
            ),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_cash_on_delivery_paid_on_delivery() {
        assert_eq!(
            payment_status_after(
                OrderStatus::Delivered,
                PaymentMethod::CashOnDelivery,
                PaymentStatus::Pending
            ),
            PaymentStatus::Paid
        );
        assert_eq!(
            payment_status_after(
                OrderStatus::Delivered,
                PaymentMethod::Card,
                PaymentStatus::Pending
            ),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_shipping_keeps_payment_status() {
        assert_eq!(
            payment_status_after(OrderStatus::Shipped, PaymentMethod::Card, PaymentStatus::Paid),
            PaymentStatus::Paid
        );
    }

    #[test]
    fn test_success_after_cancel_is_ignored() {
        // paid, then cancelled (refunded), then the success event arrives again
        assert_eq!(
            payment_update(OrderStatus::Cancelled, PaymentStatus::Refunded, true),
            PaymentUpdate::OrderCancelled
        );
        assert_eq!(
            payment_update(OrderStatus::Cancelled, PaymentStatus::Pending, true),
            PaymentUpdate::OrderCancelled
        );
        assert_eq!(
            payment_update(OrderStatus::Confirmed, PaymentStatus::Refunded, true),
            PaymentUpdate::Unchanged
        );
    }

    #[test]
    fn test_duplicate_success_is_unchanged() {
        assert_eq!(
            payment_update(OrderStatus::Pending, PaymentStatus::Pending, true),
            PaymentUpdate::Applied
        );
        assert_eq!(
            payment_update(OrderStatus::Pending, PaymentStatus::Failed, true),
            PaymentUpdate::Applied
        );
        assert_eq!(
            payment_update(OrderStatus::Confirmed, PaymentStatus::Paid, true),
            PaymentUpdate::Unchanged
        );
    }

    #[test]
    fn test_failure_never_overrides_payment() {
        assert_eq!(
            payment_update(OrderStatus::Confirmed, PaymentStatus::Paid, false),
            PaymentUpdate::Unchanged
        );
        assert_eq!(
            payment_update(OrderStatus::Pending, PaymentStatus::Failed, false),
            PaymentUpdate::Unchanged
        );
        assert_eq!(
            payment_update(OrderStatus::Pending, PaymentStatus::Pending, false),
            PaymentUpdate::Applied
        );
    }
}
