//! Admin dashboard and analytics report types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use cartwheel_core::{OrderId, OrderStatus, PaymentStatus, ProductCategory, ProductId};

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Sum of `total_price` over paid orders.
    pub total_revenue: Decimal,
    pub recent_orders: Vec<RecentOrder>,
    pub low_stock_products: Vec<LowStockProduct>,
}

/// Summary row for the dashboard's recent orders table.
#[derive(Debug, Clone, Serialize)]
pub struct RecentOrder {
    pub id: OrderId,
    pub customer_name: String,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A product at or below the low-stock threshold.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockProduct {
    pub id: ProductId,
    pub name: String,
    pub stock: i32,
}

/// Revenue and order count for one day.
#[derive(Debug, Clone, Serialize)]
pub struct SalesPoint {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub orders: i64,
}

/// A product ranked by units sold.
#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    /// `None` when the product has since been deleted.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Revenue attributed to one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRevenue {
    pub category: ProductCategory,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Number of orders in one status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}
