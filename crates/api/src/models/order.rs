//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cartwheel_core::{
    OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, ProductId,
    UserId,
};

/// A postal address. Used for order shipping and as a user's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Check that every field is non-empty after trimming.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(format!("shipping address {field} is required"));
            }
        }
        Ok(())
    }
}

/// One purchased line, with name and price captured at order time.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order has been paid for.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// A requested product and quantity.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    /// Lines to order; when absent or empty the user's cart is used.
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 Market St".to_string(),
            city: "Springfield".to_string(),
            state: "OR".to_string(),
            postal_code: "97477".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_address_validate() {
        assert!(address().validate().is_ok());

        let mut missing = address();
        missing.city = "  ".to_string();
        assert_eq!(
            missing.validate().unwrap_err(),
            "shipping address city is required"
        );
    }

    #[test]
    fn test_create_order_request_defaults() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "shipping_address": {
                "street": "1 Market St",
                "city": "Springfield",
                "state": "OR",
                "postal_code": "97477",
                "country": "US"
            }
        }))
        .unwrap();
        assert!(request.items.is_empty());
        assert_eq!(request.payment_method, PaymentMethod::Card);
    }
}
