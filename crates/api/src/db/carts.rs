//! Cart repository. One cart per user, created on first use.

use rust_decimal::Decimal;
use sqlx::PgPool;

use cartwheel_core::{CartId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::CartLine;
use crate::models::order::OrderLineRequest;

/// Cart line joined with the current product row.
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    image: Option<String>,
    price: Decimal,
    stock: i32,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            product_id: row.product_id,
            line_total: row.price * Decimal::from(row.quantity),
            name: row.name,
            image: row.image,
            price: row.price,
            stock: row.stock,
            quantity: row.quantity,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart ID, creating the cart if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<CartId, RepositoryError> {
        // DO UPDATE (not DO NOTHING) so RETURNING yields the existing row
        let id = sqlx::query_scalar::<_, CartId>(
            r"
            INSERT INTO carts (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Lines in the user's cart, oldest first. Empty when no cart exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.product_id, p.name, p.images[1] AS image, p.price, p.stock, ci.quantity
            FROM carts c
            JOIN cart_items ci ON ci.cart_id = c.id
            JOIN products p ON p.id = ci.product_id
            WHERE c.user_id = $1
            ORDER BY ci.added_at, ci.product_id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Cart contents as order lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn order_lines(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderLineRequest>, RepositoryError> {
        let rows: Vec<(ProductId, i32)> = sqlx::query_as(
            r"
            SELECT ci.product_id, ci.quantity
            FROM carts c
            JOIN cart_items ci ON ci.cart_id = c.id
            WHERE c.user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, quantity)| OrderLineRequest {
                product_id,
                quantity,
            })
            .collect())
    }

    /// Quantity of a product already in the cart (0 if absent).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<i32, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Insert a line or overwrite its quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product no longer exists.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "product no longer exists"))?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the cart.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove every line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM cart_items USING carts WHERE cart_items.cart_id = carts.id AND carts.user_id = $1",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
