//! Decimal money arithmetic and order totals.
//!
//! All amounts are `rust_decimal::Decimal` in the store currency's standard
//! unit (dollars, not cents). [`to_minor_units`] converts to the integer
//! cents the payment provider expects.
//!
//! # Totals
//!
//! ```text
//! items_price    = Σ price × quantity
//! shipping_price = 0.00 if items_price >= 100.00 else 10.00
//! tax_price      = round(items_price × 0.15)
//! total_price    = items_price + shipping_price + tax_price
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Subtotal at or above which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Flat shipping charged below the free shipping threshold.
pub const FLAT_SHIPPING: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Sales tax rate applied to the items subtotal (15%).
pub const TAX_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

/// Round an amount to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount to integer minor units (cents).
///
/// Returns `None` for negative amounts or amounts that overflow `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    (round_money(amount) * Decimal::ONE_HUNDRED).to_i64()
}

/// A priced line on an order: unit price and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    /// Unit price at the time of ordering.
    pub price: Decimal,
    /// Number of units.
    pub quantity: i32,
}

impl LineItem {
    /// Create a new line item.
    #[must_use]
    pub const fn new(price: Decimal, quantity: i32) -> Self {
        Self { price, quantity }
    }

    /// Price × quantity, unrounded.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// The four stored price columns of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of line totals.
    pub items_price: Decimal,
    /// Shipping charge.
    pub shipping_price: Decimal,
    /// Tax charge.
    pub tax_price: Decimal,
    /// Grand total.
    pub total_price: Decimal,
}

impl OrderTotals {
    /// Compute totals for a set of line items.
    ///
    /// Callers reject empty orders before getting here; an empty slice
    /// yields a zero subtotal with flat shipping.
    #[must_use]
    pub fn compute(items: &[LineItem]) -> Self {
        let items_price = round_money(items.iter().map(LineItem::line_total).sum());

        let shipping_price = if items_price >= FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING
        };

        let tax_price = round_money(items_price * TAX_RATE);
        let total_price = round_money(items_price + shipping_price + tax_price);

        Self {
            items_price,
            shipping_price,
            tax_price,
            total_price,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_totals_below_free_shipping() {
        let totals = OrderTotals::compute(&[
            LineItem::new(dec("19.99"), 2),
            LineItem::new(dec("5.00"), 1),
        ]);
        assert_eq!(totals.items_price, dec("44.98"));
        assert_eq!(totals.shipping_price, dec("10"));
        assert_eq!(totals.tax_price, dec("6.75")); // 6.747
        assert_eq!(totals.total_price, dec("61.73"));
    }

    #[test]
    fn test_totals_free_shipping_at_threshold() {
        let totals = OrderTotals::compute(&[LineItem::new(dec("50.00"), 2)]);
        assert_eq!(totals.items_price, dec("100.00"));
        assert_eq!(totals.shipping_price, Decimal::ZERO);
        assert_eq!(totals.tax_price, dec("15.00"));
        assert_eq!(totals.total_price, dec("115.00"));
    }

    #[test]
    fn test_totals_just_below_threshold() {
        let totals = OrderTotals::compute(&[LineItem::new(dec("99.99"), 1)]);
        assert_eq!(totals.shipping_price, dec("10"));
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        let totals = OrderTotals::compute(&[
            LineItem::new(dec("3.33"), 3),
            LineItem::new(dec("0.01"), 7),
        ]);
        assert_eq!(
            totals.total_price,
            totals.items_price + totals.shipping_price + totals.tax_price
        );
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec("0.125")), dec("0.13"));
        assert_eq!(round_money(dec("0.124")), dec("0.12"));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(dec("61.73")), Some(6173));
        assert_eq!(to_minor_units(dec("0")), Some(0));
        assert_eq!(to_minor_units(dec("-1.00")), None);
    }
}
