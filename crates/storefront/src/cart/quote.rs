//! Checkout quote: shipping and loyalty points on top of the cart total.

use corner_shop_core::Price;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// Pricing rules applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotePolicy {
    /// Subtotals strictly above this ship for free.
    pub free_shipping_over: Price,
    pub shipping_fee: Price,
    /// Value of a single loyalty point.
    pub point_value: Price,
}

impl Default for QuotePolicy {
    fn default() -> Self {
        Self {
            free_shipping_over: Price::from_cents(10_000),
            shipping_fee: Price::from_cents(1_000),
            point_value: Price::from_cents(1),
        }
    }
}

/// Breakdown shown before the shopper confirms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutQuote {
    pub subtotal: Price,
    pub shipping: Price,
    pub points_used: u64,
    pub discount: Price,
    pub total: Price,
}

impl QuotePolicy {
    /// Quote `subtotal`, redeeming up to `points` out of `balance`.
    ///
    /// Redeemed points never exceed the balance nor the subtotal's worth of
    /// points, so the discount can only bring the total down to the shipping fee.
    #[must_use]
    pub fn quote(&self, subtotal: Price, points: u64, balance: u64) -> CheckoutQuote {
        let shipping = if subtotal > self.free_shipping_over {
            Price::ZERO
        } else {
            self.shipping_fee
        };

        let points_used = points.min(balance).min(self.points_worth(subtotal));
        let discount = Price::new(self.point_value.amount() * Decimal::from(points_used))
            .unwrap_or(Price::ZERO)
            .min(subtotal);

        CheckoutQuote {
            subtotal,
            shipping,
            points_used,
            discount,
            total: (subtotal + shipping).saturating_sub(discount),
        }
    }

    /// Whole number of points needed to cover `amount`.
    fn points_worth(&self, amount: Price) -> u64 {
        if self.point_value == Price::ZERO {
            return 0;
        }
        (amount.amount() / self.point_value.amount())
            .floor()
            .to_u64()
            .unwrap_or(u64::MAX)
    }
}
