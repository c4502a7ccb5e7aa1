//! Cart lines and orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::OrderId;
use super::price::Price;
use super::product::{CompositionUnit, Product};
use super::status::OrderStatus;

/// A product in the cart with its quantity and per-unit composition.
///
/// Invariant: `smart_composition.len() == qty` whenever `qty > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product: Product,
    pub qty: u32,
    #[serde(default)]
    pub smart_composition: Vec<CompositionUnit>,
}

impl CartLine {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.qty)
    }
}

/// An order ready to be created in the `orders` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub products_list: Vec<CartLine>,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Snapshot `lines` into a pending order stamped at `created_at`.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>, created_at: DateTime<Utc>) -> Self {
        let total = lines.iter().map(CartLine::line_total).sum();
        Self {
            products_list: lines,
            total,
            status: OrderStatus::Pending,
            created_at,
        }
    }
}

/// An order from the `orders` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub products_list: Vec<CartLine>,
    pub total: Price,
    #[serde(default, alias = "orderState")]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Order {
    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.products_list.iter().map(|line| line.qty).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn line(id: &str, cents: i64, qty: u32) -> CartLine {
        CartLine {
            product: Product::new(id, id, Price::from_cents(cents)),
            qty,
            smart_composition: Vec::new(),
        }
    }

    #[test]
    fn test_new_order_totals_lines() {
        let order = NewOrder::from_lines(vec![line("a", 1000, 2), line("b", 500, 3)], Utc::now());
        assert_eq!(order.total, Price::from_cents(3500));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_order_accepts_legacy_state_field() {
        let order: Order = serde_json::from_value(json!({
            "id": "o1",
            "total": 12,
            "orderState": "ready",
            "createdAt": "2026-01-02T03:04:05Z"
        }))
        .unwrap();
        assert_eq!(order.status, OrderStatus::Ready);
        assert_eq!(order.item_count(), 0);
    }
}
