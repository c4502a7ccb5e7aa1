//! Seed the hosted collections from a JSON file.
//!
//! # Usage
//!
//! ```bash
//! # Check a seed file without writing anything
//! cs-cli seed --file seed.json --dry-run
//!
//! # Create every product and order in the hosted collections
//! cs-cli seed --file seed.json
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_REMOTE_URL` - Base URL of the hosted document API
//! - `STOREFRONT_REMOTE_API_KEY` - API key
//! - `STOREFRONT_REMOTE_PROJECT_ID` - Optional project id
//!
//! Ids in the file are not preserved: the hosted collection assigns new ones.

use std::path::Path;

use corner_shop_core::{Order, Product};
use corner_shop_storefront::config::StorefrontConfig;
use corner_shop_storefront::remote::{Record, RemoteCollection, RestCollection};
use corner_shop_storefront::seed::Seed;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedCommandError {
    /// No hosted collection is configured.
    #[error("STOREFRONT_REMOTE_URL is not set; nothing to seed")]
    NoRemote,

    /// Some records do not decode into the storefront model.
    #[error("{0} invalid record(s) in seed file")]
    InvalidRecords(usize),
}

/// Validate a seed file and, unless `dry_run`, create its records remotely.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded, a record is invalid, the
/// configuration is missing or invalid, or a remote write fails.
pub async fn run(file: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let seed = Seed::load(file).await?;

    let invalid = count_invalid::<Product>("products", &seed.products)
        + count_invalid::<Order>("orders", &seed.orders);
    if invalid > 0 {
        return Err(SeedCommandError::InvalidRecords(invalid).into());
    }

    info!(
        products = seed.products.len(),
        orders = seed.orders.len(),
        "Seed file is valid"
    );
    if dry_run {
        return Ok(());
    }

    let config = StorefrontConfig::from_env()?;
    let remote = config.remote.ok_or(SeedCommandError::NoRemote)?;

    for (collection, records) in [("products", seed.products), ("orders", seed.orders)] {
        let client = RestCollection::new(&remote, collection)?;
        let total = records.len();
        for record in records {
            client.create(record.fields).await?;
        }
        info!(collection, total, "Collection seeded");
    }

    Ok(())
}

/// Count records that would be skipped by the storefront, logging each one.
fn count_invalid<T: serde::de::DeserializeOwned>(collection: &str, records: &[Record]) -> usize {
    records
        .iter()
        .filter(|record| match record.decode::<T>() {
            Ok(_) => false,
            Err(e) => {
                warn!(collection, id = %record.id, error = %e, "Invalid record");
                true
            }
        })
        .count()
}

/// Read a seed file into pretty JSON, one collection per key.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded.
pub async fn describe(file: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let seed = Seed::load(file).await?;
    Ok(serde_json::json!({
        "products": seed.products.into_iter().map(Record::into_value).collect::<Vec<_>>(),
        "orders": seed.orders.into_iter().map(Record::into_value).collect::<Vec<_>>(),
    }))
}
