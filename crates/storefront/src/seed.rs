//! Seed data for the in-memory collections.
//!
//! A seed file is a JSON object with one array per collection:
//!
//! ```json
//! { "products": [{ "id": "p1", "name": "Chai", "price": 4.5 }], "orders": [] }
//! ```
//!
//! Entries without a string `id` get a generated one.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::remote::Record;

/// Errors loading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Cannot read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Seed entry {index} of {collection} is not an object")]
    NotAnObject { collection: &'static str, index: usize },
}

#[derive(Deserialize)]
struct SeedFile {
    #[serde(default)]
    products: Vec<Value>,
    #[serde(default)]
    orders: Vec<Value>,
}

/// Records to load into each collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seed {
    pub products: Vec<Record>,
    pub orders: Vec<Record>,
}

impl Seed {
    /// Parse seed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Parse`] for malformed JSON and
    /// [`SeedError::NotAnObject`] for entries that are not objects.
    pub fn parse(json: &str) -> Result<Self, SeedError> {
        let file: SeedFile = serde_json::from_str(json)?;
        Ok(Self {
            products: records("products", file.products)?,
            orders: records("orders", file.orders)?,
        })
    }

    /// Read and parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Io`] if the file cannot be read, otherwise as
    /// [`Self::parse`].
    pub async fn load(path: &Path) -> Result<Self, SeedError> {
        let json = tokio::fs::read_to_string(path).await?;
        let seed = Self::parse(&json)?;
        info!(
            path = %path.display(),
            products = seed.products.len(),
            orders = seed.orders.len(),
            "Seed file loaded"
        );
        Ok(seed)
    }
}

fn records(collection: &'static str, values: Vec<Value>) -> Result<Vec<Record>, SeedError> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(mut fields) => {
                let id = match fields.remove("id") {
                    Some(Value::String(id)) if !id.is_empty() => id,
                    _ => uuid::Uuid::new_v4().simple().to_string(),
                };
                Ok(Record::new(id, fields))
            }
            _ => Err(SeedError::NotAnObject { collection, index }),
        })
        .collect()
}
