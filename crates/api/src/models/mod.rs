//! Domain models for the API.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. They serialize directly as API response bodies.

pub mod analytics;
pub mod cart;
pub mod order;
pub mod product;
pub mod user;

use serde::{Deserialize, Serialize};

use cartwheel_core::{Email, UserId, UserRole};

pub use order::ShippingAddress;

/// The authenticated caller, resolved from a bearer token on each request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Account role.
    pub role: UserRole,
}

impl CurrentUser {
    /// Whether the caller has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Pagination query parameters shared by list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Items per page.
    pub limit: Option<u32>,
}

impl PageParams {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 12;
    /// Maximum page size.
    pub const MAX_LIMIT: u32 = 100;

    /// Clamped page number (at least 1).
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Clamped page size (1..=100).
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Row offset for SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }
}

/// A page of results with navigation metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Current page (1-based).
    pub page: u32,
    /// Total number of pages (at least 1).
    pub pages: u32,
    /// Total number of matching items.
    pub total: i64,
}

impl<T> Page<T> {
    /// Build a page from items and the total match count.
    #[must_use]
    pub fn new(items: Vec<T>, params: PageParams, total: i64) -> Self {
        let limit = i64::from(params.limit());
        let pages = u32::try_from(((total + limit - 1) / limit).max(1)).unwrap_or(u32::MAX);
        Self {
            items,
            page: params.page(),
            pages,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults_and_clamping() {
        let params = PageParams {
            page: None,
            limit: None,
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 12);
        assert_eq!(params.offset(), 0);

        let params = PageParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 100);

        let params = PageParams {
            page: Some(3),
            limit: Some(20),
        };
        assert_eq!(params.offset(), 40);
    }

    #[test]
    fn test_page_count() {
        let params = PageParams {
            page: Some(1),
            limit: Some(10),
        };
        assert_eq!(Page::<()>::new(vec![], params, 0).pages, 1);
        assert_eq!(Page::<()>::new(vec![], params, 10).pages, 1);
        assert_eq!(Page::<()>::new(vec![], params, 11).pages, 2);
    }
}
