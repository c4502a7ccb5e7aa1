//! Product catalog.
//!
//! # Architecture
//!
//! - [`CatalogStore`] keeps a live, mirrored snapshot of the `products`
//!   collection and the distinct categories derived from it
//! - [`search::SearchEngine`] turns that snapshot into the visible list
//! - [`composition::compose`] builds per-unit compositions for cart lines
//!
//! Catalog writes go straight to the remote. The list only changes when the
//! resulting snapshot comes back through the subscription.

pub mod composition;
pub mod filter;
pub mod search;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use corner_shop_core::{CategoryFilter, CompositionUnit, Price, Product, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::live::{CollectionSpec, LiveCollection, LiveItem, LiveState, StoreError, SubscriptionGuard};
use crate::mirror::LocalMirror;
use crate::remote::{CollectionQuery, Direction, RemoteCollection, to_fields};

pub use composition::compose;
pub use search::{FilterState, SearchEngine};

/// Mirror store holding the product list.
pub const PRODUCTS_STORE: &str = "products";
/// Mirror store holding the derived category list.
pub const CATEGORIES_STORE: &str = "categories";

impl LiveItem for Product {
    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }
}

/// A product to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_price: Option<Price>,
    #[serde(default)]
    pub category: String,
    #[serde(default = "in_stock")]
    pub stock: bool,
    #[serde(default)]
    pub sale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_composition: Option<Vec<CompositionUnit>>,
}

const fn in_stock() -> bool {
    true
}

impl ProductDraft {
    /// Draft an available product with only the required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, price: Price) -> Self {
        Self {
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
        }
    }

    /// Builder-style category setter.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamped<'a, T> {
    #[serde(flatten)]
    body: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

/// Partial product update. Only the fields that are set are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl ProductPatch {
    /// Whether the patch sets nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Tunables for the catalog subscription.
#[derive(Debug, Clone, Copy)]
pub struct CatalogOptions {
    /// Cap on the number of products visible.
    pub limit: usize,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self { limit: 200 }
    }
}

/// Live product catalog.
#[derive(Clone)]
pub struct CatalogStore {
    live: LiveCollection<Product>,
}

impl CatalogStore {
    /// Create a store over `remote`, mirrored to `mirror` when given.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCollection>,
        mirror: Option<Arc<dyn LocalMirror>>,
        options: CatalogOptions,
    ) -> Self {
        let spec = CollectionSpec {
            query: CollectionQuery::new("name", Direction::Descending, options.limit),
            mirror_store: PRODUCTS_STORE,
            categories_store: Some(CATEGORIES_STORE),
        };
        Self {
            live: LiveCollection::new(spec, remote, mirror),
        }
    }

    /// Underlying live collection.
    #[must_use]
    pub const fn live(&self) -> &LiveCollection<Product> {
        &self.live
    }

    /// Start following the remote collection.
    pub fn attach(&self) -> SubscriptionGuard {
        self.live.attach()
    }

    /// Current catalog state.
    #[must_use]
    pub fn state(&self) -> Arc<LiveState<Product>> {
        self.live.state()
    }

    /// Receiver notified on every catalog change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<LiveState<Product>>> {
        self.live.watch()
    }

    /// Distinct categories in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.state().categories)
    }

    /// Products in `category`, in catalog order.
    #[must_use]
    pub fn filtered(&self, category: &CategoryFilter) -> Vec<Product> {
        filter::filter_by_category(&self.state().items, category)
    }

    /// Look up a product in the current snapshot.
    #[must_use]
    pub fn find(&self, id: &ProductId) -> Option<Product> {
        self.state().items.iter().find(|product| &product.id == id).cloned()
    }

    /// Create a product, stamping `createdAt`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for a blank name, or the remote error
    /// (also flagged on the state).
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn add_product(&self, draft: ProductDraft) -> Result<ProductId, StoreError> {
        if draft.name.trim().is_empty() {
            return Err(StoreError::Invalid("product name is required".to_string()));
        }
        let fields = to_fields(&Stamped {
            body: &draft,
            created_at: Some(Utc::now()),
            last_updated: None,
        })?;
        let id = self.live.create(fields).await?;
        info!(product_id = %id, "Product created");
        Ok(ProductId::new(id))
    }

    /// Merge `patch` into a product, stamping `lastUpdated`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an empty patch, or the remote error
    /// (also flagged on the state).
    #[instrument(skip(self, patch), fields(product_id = %id))]
    pub async fn update_product(&self, id: &ProductId, patch: ProductPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Err(StoreError::Invalid("nothing to update".to_string()));
        }
        let fields = to_fields(&Stamped {
            body: &patch,
            created_at: None,
            last_updated: Some(Utc::now()),
        })?;
        self.live.update(id.as_str(), fields).await?;
        Ok(())
    }

    /// Toggle availability.
    ///
    /// # Errors
    ///
    /// Returns the remote error (also flagged on the state).
    pub async fn set_stock(&self, id: &ProductId, stock: bool) -> Result<(), StoreError> {
        let patch = ProductPatch {
            stock: Some(stock),
            ..ProductPatch::default()
        };
        self.update_product(id, patch).await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns the remote error (also flagged on the state).
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), StoreError> {
        self.live.delete(id.as_str()).await?;
        info!("Product deleted");
        Ok(())
    }
}
