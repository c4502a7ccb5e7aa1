//! Inspect and prime the on-disk mirror.
//!
//! # Usage
//!
//! ```bash
//! # Print the mirrored products
//! cs-cli mirror show --dir ./mirror
//!
//! # Print the mirrored orders
//! cs-cli mirror show --dir ./mirror --store orders
//!
//! # Prime the mirror from a seed file so the storefront starts offline
//! cs-cli mirror prime --dir ./mirror --file seed.json
//! ```

use std::path::Path;

use corner_shop_storefront::mirror::{FileMirror, LocalMirror};
use corner_shop_storefront::remote::Record;
use corner_shop_storefront::seed::Seed;
use serde_json::Value;
use tracing::info;

/// Read every record of one mirrored store.
///
/// # Errors
///
/// Returns an error if the mirror cannot be opened or the store is corrupt.
pub async fn show(dir: &Path, store: &str) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let mirror = FileMirror::open(dir).await?;
    let records = mirror.get_all(store).await?;
    info!(store, count = records.len(), dir = %dir.display(), "Mirror store read");
    Ok(records)
}

/// Replace the mirrored products and orders with the contents of a seed file.
///
/// # Errors
///
/// Returns an error if the seed file cannot be loaded or the mirror write fails.
pub async fn prime(dir: &Path, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let seed = Seed::load(file).await?;
    let mirror = FileMirror::open(dir).await?;

    for (store, records) in [("products", seed.products), ("orders", seed.orders)] {
        let count = records.len();
        let values = records.into_iter().map(Record::into_value).collect();
        mirror.put(store, values).await?;
        info!(store, count, "Mirror store primed");
    }
    Ok(())
}
