//! Product repository for catalog queries and admin CRUD.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use cartwheel_core::{ProductCategory, ProductId};

use super::RepositoryError;
use crate::models::PageParams;
use crate::models::product::{CategoryCount, NewProduct, Product, ProductFilter, ProductUpdate};

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, brand, images, stock, \
                               featured, rating, num_reviews, created_at, updated_at";

/// Database row for `products`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    category: ProductCategory,
    brand: Option<String>,
    images: Vec<String>,
    stock: i32,
    featured: bool,
    rating: Decimal,
    num_reviews: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            category: row.category,
            brand: row.brand,
            images: row.images,
            stock: row.stock,
            featured: row.featured,
            rating: row.rating,
            num_reviews: row.num_reviews,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Append the `WHERE` clause for a listing filter.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    builder.push(" WHERE TRUE");

    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(q));
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(brand) = filter.brand.as_deref().filter(|b| !b.is_empty()) {
        builder.push(" AND brand ILIKE ").push_bind(escape_like(brand));
    }
    if let Some(min) = filter.min_price {
        builder.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        builder.push(" AND price <= ").push_bind(max);
    }
    if let Some(featured) = filter.featured {
        builder.push(" AND featured = ").push_bind(featured);
    }
    if filter.in_stock == Some(true) {
        builder.push(" AND stock > 0");
    }
}

/// Escape `%`, `_` and `\` so user input matches literally in `ILIKE`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        params: PageParams,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(i64::from(params.limit()))
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;

        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Count products per category (categories with no products are omitted).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_counts(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let rows: Vec<(ProductCategory, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM products GROUP BY category ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (name, description, price, category, brand, images, stock, featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(product.price)
        .bind(product.category)
        .bind(product.brand.as_deref())
        .bind(&product.images)
        .bind(product.stock)
        .bind(product.featured)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                category = COALESCE($5, category),
                brand = COALESCE($6, brand),
                images = COALESCE($7, images),
                stock = COALESCE($8, stock),
                featured = COALESCE($9, featured),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.description.as_deref())
        .bind(update.price)
        .bind(update.category)
        .bind(update.brand.as_deref())
        .bind(update.images.as_deref())
        .bind(update.stock)
        .bind(update.featured)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Append an image URL to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_image(&self, id: ProductId, url: &str) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET images = array_append(images, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product. Order history keeps its snapshot lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50% off_sale\\"), "50\\% off\\_sale\\\\");
        assert_eq!(escape_like("lamp"), "lamp");
    }

    #[test]
    fn test_filter_sql() {
        let filter = ProductFilter {
            q: Some("lamp".to_string()),
            category: Some(ProductCategory::Home),
            in_stock: Some(true),
            ..ProductFilter::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filter(&mut builder, &filter);
        let sql = builder.sql();
        assert!(sql.contains("name ILIKE $1"));
        assert!(sql.contains("category = $4"));
        assert!(sql.ends_with("AND stock > 0"));
    }
}
