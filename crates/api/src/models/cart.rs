//! Shopping cart types.

use rust_decimal::Decimal;
use serde::Serialize;

use cartwheel_core::{ProductId, round_money};

/// One product line in a cart, joined with current product data.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// Current catalog price (carts are never price-locked).
    pub price: Decimal,
    /// Units currently in stock.
    pub stock: i32,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A user's cart as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Total units across all lines.
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl CartView {
    /// Build a view from lines, computing counts and subtotal.
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = round_money(items.iter().map(|l| l.line_total).sum());
        Self {
            items,
            item_count,
            subtotal,
        }
    }

    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_lines(Vec::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: &str, quantity: i32) -> CartLine {
        let price: Decimal = price.parse().unwrap();
        CartLine {
            product_id: ProductId::new(id),
            name: format!("product {id}"),
            image: None,
            price,
            stock: 10,
            quantity,
            line_total: price * Decimal::from(quantity),
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::from_lines(vec![line(1, "2.50", 2), line(2, "10.00", 1)]);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "15.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_empty_cart() {
        let view = CartView::empty();
        assert!(view.items.is_empty());
        assert_eq!(view.item_count, 0);
        assert_eq!(view.subtotal, Decimal::ZERO);
    }
}
