//! Catalog products and their per-unit composition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Per-unit customization payload (toppings, notes, ...).
///
/// Opaque to the storefront; carried through reconciliation untouched.
pub type Customization = serde_json::Map<String, serde_json::Value>;

/// A product from the `products` collection.
///
/// Field names follow the hosted collection (`previousPrice`,
/// `smartComposition`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: String,
    pub price: Price,
    /// Price before the sale, shown struck through when `sale` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_price: Option<Price>,
    #[serde(default)]
    pub category: String,
    /// Availability flag. Missing means available.
    #[serde(default = "default_stock")]
    pub stock: bool,
    #[serde(default)]
    pub sale: bool,
    /// Image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Pre-computed composition, when the product ships with one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_composition: Option<Vec<CompositionUnit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

const fn default_stock() -> bool {
    true
}

impl Product {
    /// Create an available product with the required fields set.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            ingredients: String::new(),
            price,
            previous_price: None,
            category: String::new(),
            stock: true,
            sale: false,
            src: None,
            smart_composition: None,
            created_at: None,
            last_updated: None,
        }
    }

    /// Builder-style category setter.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder-style description setter.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder-style ingredients setter.
    #[must_use]
    pub fn with_ingredients(mut self, ingredients: impl Into<String>) -> Self {
        self.ingredients = ingredients.into();
        self
    }

    /// Builder-style availability setter.
    #[must_use]
    pub const fn with_stock(mut self, stock: bool) -> Self {
        self.stock = stock;
        self
    }

    /// Whether the product is on sale with a higher previous price.
    #[must_use]
    pub fn discounted(&self) -> bool {
        self.sale && self.previous_price.is_some_and(|previous| previous > self.price)
    }
}

/// One physical unit of a multi-unit cart line.
///
/// Carries a full snapshot of the product (with its own composition
/// cleared) so each unit can be customized independently. `cod` is the
/// 1-based sequence number used as the display and reconciliation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionUnit {
    #[serde(flatten)]
    pub product: Product,
    /// Always 1: a unit is one item.
    #[serde(default = "unit_qty")]
    pub qty: u32,
    #[serde(rename = "_cod")]
    pub cod: u32,
    #[serde(default, skip_serializing_if = "Customization::is_empty")]
    pub customization: Customization,
}

const fn unit_qty() -> u32 {
    1
}

impl CompositionUnit {
    /// A unit of `product` with the default (empty) customization.
    #[must_use]
    pub fn fresh(product: &Product, cod: u32) -> Self {
        Self {
            product: Product {
                smart_composition: None,
                ..product.clone()
            },
            qty: 1,
            cod,
            customization: Customization::new(),
        }
    }

    /// Whether the unit still carries the default customization.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.customization.is_empty()
    }
}
