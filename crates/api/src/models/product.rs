//! Product catalog types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cartwheel_core::{ProductCategory, ProductId};

/// Maximum product name length.
pub const MAX_NAME_LENGTH: usize = 200;

/// A catalog product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: ProductCategory,
    pub brand: Option<String>,
    pub images: Vec<String>,
    pub stock: i32,
    pub featured: bool,
    pub rating: Decimal,
    pub num_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image, used as the thumbnail in carts and orders.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Sort orders for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
    Rating,
}

impl ProductSort {
    /// SQL `ORDER BY` clause. Static strings only, never user input.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id DESC",
            Self::PriceAsc => "price ASC, id ASC",
            Self::PriceDesc => "price DESC, id DESC",
            Self::Name => "name ASC, id ASC",
            Self::Rating => "rating DESC, num_reviews DESC, id DESC",
        }
    }
}

/// Listing filters parsed from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive search over name, description and brand.
    pub q: Option<String>,
    pub category: Option<ProductCategory>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    /// Only products with stock > 0.
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
}

/// Validated input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub category: ProductCategory,
    pub brand: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub featured: bool,
}

/// Partial product update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<ProductCategory>,
    pub brand: Option<String>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub featured: Option<bool>,
}

/// Check the shared field constraints of create and update payloads.
///
/// # Errors
///
/// Returns a human-readable message for the first violated constraint.
pub fn validate_fields(
    name: Option<&str>,
    price: Option<Decimal>,
    stock: Option<i32>,
) -> Result<(), String> {
    if let Some(name) = name {
        let len = name.trim().chars().count();
        if len == 0 {
            return Err("product name is required".to_string());
        }
        if len > MAX_NAME_LENGTH {
            return Err(format!(
                "product name must be at most {MAX_NAME_LENGTH} characters"
            ));
        }
    }
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err("price cannot be negative".to_string());
    }
    if stock.is_some_and(|s| s < 0) {
        return Err("stock cannot be negative".to_string());
    }
    Ok(())
}

impl NewProduct {
    /// Validate field constraints.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(Some(&self.name), Some(self.price), Some(self.stock))
    }
}

impl ProductUpdate {
    /// Validate the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(self.name.as_deref(), self.price, self.stock)
    }
}

/// Product count for one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: ProductCategory,
    pub count: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fields() {
        assert!(validate_fields(Some("Desk lamp"), Some(Decimal::ONE), Some(3)).is_ok());
        assert!(validate_fields(Some("   "), None, None).is_err());
        assert!(validate_fields(Some(&"x".repeat(201)), None, None).is_err());
        assert!(validate_fields(None, Some(Decimal::NEGATIVE_ONE), None).is_err());
        assert!(validate_fields(None, None, Some(-1)).is_err());
        assert!(validate_fields(None, None, None).is_ok());
    }

    #[test]
    fn test_filter_deserializes_sort() {
        let filter: ProductFilter =
            serde_json::from_str(r#"{"sort":"price_desc","category":"books"}"#).unwrap();
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert_eq!(filter.category, Some(ProductCategory::Books));
    }
}
