//! Sales reports for admins.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use crate::db::AnalyticsRepository;
use crate::error::{AppError, Result};
use crate::extract::ApiQuery;
use crate::middleware::RequireAdmin;
use crate::models::analytics::{CategoryRevenue, SalesPoint, StatusCount, TopProduct};
use crate::state::AppState;

const DEFAULT_DAYS: i32 = 30;
const MAX_DAYS: i32 = 365;
const DEFAULT_TOP: i64 = 5;
const MAX_TOP: i64 = 50;

/// Query of `GET /api/analytics/sales`.
#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    pub days: Option<i32>,
}

impl SalesQuery {
    fn days(&self) -> Result<i32> {
        match self.days {
            None => Ok(DEFAULT_DAYS),
            Some(days) if (1..=MAX_DAYS).contains(&days) => Ok(days),
            Some(_) => Err(AppError::BadRequest(format!(
                "days must be between 1 and {MAX_DAYS}"
            ))),
        }
    }
}

/// Query of `GET /api/analytics/top-products`.
#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<i64>,
}

impl TopQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_TOP).clamp(1, MAX_TOP)
    }
}

/// Daily paid revenue and order counts.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn sales(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(query): ApiQuery<SalesQuery>,
) -> Result<Json<Vec<SalesPoint>>> {
    let days = query.days()?;
    let points = AnalyticsRepository::new(state.pool())
        .sales_by_day(days)
        .await?;
    Ok(Json(points))
}

/// Best sellers by units.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn top_products(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(query): ApiQuery<TopQuery>,
) -> Result<Json<Vec<TopProduct>>> {
    let products = AnalyticsRepository::new(state.pool())
        .top_products(query.limit())
        .await?;
    Ok(Json(products))
}

/// Paid revenue per category.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn categories(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<CategoryRevenue>>> {
    let revenue = AnalyticsRepository::new(state.pool())
        .category_revenue()
        .await?;
    Ok(Json(revenue))
}

/// Order counts per status.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<StatusCount>>> {
    let counts = AnalyticsRepository::new(state.pool())
        .status_counts()
        .await?;
    Ok(Json(counts))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sales_days_bounds() {
        assert_eq!(SalesQuery { days: None }.days().unwrap(), 30);
        assert_eq!(SalesQuery { days: Some(1) }.days().unwrap(), 1);
        assert_eq!(SalesQuery { days: Some(365) }.days().unwrap(), 365);
        assert!(SalesQuery { days: Some(0) }.days().is_err());
        assert!(SalesQuery { days: Some(366) }.days().is_err());
    }

    #[test]
    fn test_top_limit_clamped() {
        assert_eq!(TopQuery { limit: None }.limit(), 5);
        assert_eq!(TopQuery { limit: Some(500) }.limit(), 50);
        assert_eq!(TopQuery { limit: Some(0) }.limit(), 1);
    }
}
