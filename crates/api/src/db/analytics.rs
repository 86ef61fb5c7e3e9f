//! Read-only aggregate queries for the admin dashboard and analytics reports.
//!
//! Revenue figures only count orders with `payment_status = 'paid'`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use cartwheel_core::{OrderId, OrderStatus, PaymentStatus, ProductCategory, ProductId};

use super::RepositoryError;
use crate::models::analytics::{
    CategoryRevenue, DashboardStats, LowStockProduct, RecentOrder, SalesPoint, StatusCount,
    TopProduct,
};

/// Products at or below this stock level show up on the dashboard.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

const RECENT_ORDER_LIMIT: i64 = 5;
const LOW_STOCK_LIMIT: i64 = 10;

#[derive(Debug, sqlx::FromRow)]
struct Totals {
    total_users: i64,
    total_products: i64,
    total_orders: i64,
    pending_orders: i64,
    total_revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct RecentOrderRow {
    id: OrderId,
    customer_name: String,
    total_price: Decimal,
    status: OrderStatus,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
}

/// Repository for analytics queries.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    /// Create a new analytics repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Headline counts, paid revenue, latest orders and low-stock products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn dashboard(&self) -> Result<DashboardStats, RepositoryError> {
        let totals = sqlx::query_as::<_, Totals>(
            r"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM products) AS total_products,
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
                (SELECT COALESCE(SUM(total_price), 0) FROM orders
                 WHERE payment_status = 'paid') AS total_revenue
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let recent_orders = sqlx::query_as::<_, RecentOrderRow>(
            r"
            SELECT o.id, u.name AS customer_name, o.total_price, o.status,
                   o.payment_status, o.created_at
            FROM orders o
            JOIN users u ON u.id = o.user_id
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $1
            ",
        )
        .bind(RECENT_ORDER_LIMIT)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|row| RecentOrder {
            id: row.id,
            customer_name: row.customer_name,
            total_price: row.total_price,
            status: row.status,
            payment_status: row.payment_status,
            created_at: row.created_at,
        })
        .collect();

        let low_stock_products = sqlx::query_as::<_, (ProductId, String, i32)>(
            "SELECT id, name, stock FROM products WHERE stock <= $1 ORDER BY stock, id LIMIT $2",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .bind(LOW_STOCK_LIMIT)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|(id, name, stock)| LowStockProduct { id, name, stock })
        .collect();

        Ok(DashboardStats {
            total_users: totals.total_users,
            total_products: totals.total_products,
            total_orders: totals.total_orders,
            pending_orders: totals.pending_orders,
            total_revenue: totals.total_revenue,
            recent_orders,
            low_stock_products,
        })
    }

    /// Paid revenue and order count per UTC day for the last `days` days,
    /// including days with no sales.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_day(&self, days: i32) -> Result<Vec<SalesPoint>, RepositoryError> {
        let rows = sqlx::query_as::<_, (NaiveDate, Decimal, i64)>(
            r"
            WITH today AS (SELECT (CURRENT_TIMESTAMP AT TIME ZONE 'UTC')::date AS d)
            SELECT day::date AS date,
                   COALESCE(SUM(o.total_price), 0) AS revenue,
                   COUNT(o.id) AS orders
            FROM today,
                 generate_series(today.d - ($1 - 1), today.d, INTERVAL '1 day') AS day
            LEFT JOIN orders o
                   ON (o.created_at AT TIME ZONE 'UTC')::date = day::date
                  AND o.payment_status = 'paid'
            GROUP BY day
            ORDER BY day
            ",
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, revenue, orders)| SalesPoint {
                date,
                revenue,
                orders,
            })
            .collect())
    }

    /// Best-selling products by units sold in paid orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(&self, limit: i64) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, (Option<ProductId>, String, i64, Decimal)>(
            r"
            SELECT oi.product_id, oi.name,
                   SUM(oi.quantity)::BIGINT AS units_sold,
                   SUM(oi.price * oi.quantity) AS revenue
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.payment_status = 'paid'
            GROUP BY oi.product_id, oi.name
            ORDER BY units_sold DESC, revenue DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, name, units_sold, revenue)| TopProduct {
                product_id,
                name,
                units_sold,
                revenue,
            })
            .collect())
    }

    /// Paid revenue per product category. Lines for deleted products are
    /// excluded since their category is gone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_revenue(&self) -> Result<Vec<CategoryRevenue>, RepositoryError> {
        let rows = sqlx::query_as::<_, (ProductCategory, i64, Decimal)>(
            r"
            SELECT p.category,
                   SUM(oi.quantity)::BIGINT AS units_sold,
                   SUM(oi.price * oi.quantity) AS revenue
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN products p ON p.id = oi.product_id
            WHERE o.payment_status = 'paid'
            GROUP BY p.category
            ORDER BY revenue DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, units_sold, revenue)| CategoryRevenue {
                category,
                units_sold,
                revenue,
            })
            .collect())
    }

    /// Number of orders in each status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_counts(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }
}
