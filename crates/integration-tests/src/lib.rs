//! Integration tests for Corner Shop.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (no services needed)
//! cargo test -p corner-shop-integration-tests
//!
//! # HTTP smoke tests against a running storefront
//! STOREFRONT_BASE_URL=http://localhost:3000 \
//!     cargo test -p corner-shop-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `shopping_flow` - Catalog, search, cart and checkout over in-memory collections
//! - `offline_mirror` - Mirror fallback across a restart
//! - `storefront_api` - HTTP tests against a running server (ignored by default)

use std::sync::Arc;

use corner_shop_core::Product;
use corner_shop_storefront::live::{LiveItem, LiveState};
use corner_shop_storefront::remote::{Record, to_fields};
use serde_json::Value;
use tokio::sync::watch;

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Build a remote record from a product.
///
/// # Panics
///
/// Panics if the product does not serialize to an object.
#[must_use]
pub fn product_record(product: &Product) -> Record {
    Record::from_item(product).expect("product serializes to an object")
}

/// Build a remote record from raw JSON fields.
///
/// # Panics
///
/// Panics if `fields` is not a JSON object.
#[must_use]
pub fn raw_record(id: &str, fields: &Value) -> Record {
    Record::new(id, to_fields(fields).expect("fields are a JSON object"))
}

/// Wait until the first snapshot, error or mirror restore lands.
///
/// # Panics
///
/// Panics if the collection is dropped while waiting.
pub async fn settled<T: LiveItem>(
    rx: &mut watch::Receiver<Arc<LiveState<T>>>,
) -> Arc<LiveState<T>> {
    Arc::clone(
        &*rx.wait_for(|state| !state.loading)
            .await
            .expect("collection alive"),
    )
}

/// Wait until the state reaches `version` or later.
///
/// # Panics
///
/// Panics if the collection is dropped while waiting.
pub async fn at_version<T: LiveItem>(
    rx: &mut watch::Receiver<Arc<LiveState<T>>>,
    version: u64,
) -> Arc<LiveState<T>> {
    Arc::clone(
        &*rx.wait_for(|state| state.version >= version)
            .await
            .expect("collection alive"),
    )
}
