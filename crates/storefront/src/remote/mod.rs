//! Boundary to the hosted document database.
//!
//! # Architecture
//!
//! - Records are opaque JSON maps keyed by a document id
//! - Reads happen only through long-lived subscriptions that push full
//!   snapshots of an ordered, capped query
//! - Writes are plain request/response calls; their effect becomes visible
//!   only through the next snapshot
//!
//! Two adapters are provided:
//! - [`MemoryCollection`] - in-process collection for local runs and tests
//! - [`RestCollection`] - polling client for a JSON document REST API

mod memory;
mod rest;

pub use memory::MemoryCollection;
pub use rest::RestCollection;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Field map of a document, without its id.
pub type Fields = serde_json::Map<String, Value>;

/// Errors that can occur when talking to the hosted collection.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Document not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the remote.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A record could not be encoded for writing.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The collection cannot serve requests right now.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Sort direction of a subscription query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// Wire value (`asc` / `desc`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Ordered, capped query a subscription is registered with.
///
/// The cap is a plain limit, not pagination: documents past it are invisible.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionQuery {
    pub order_by: String,
    pub direction: Direction,
    pub limit: usize,
}

impl CollectionQuery {
    /// Query ordered by `field` in `direction`, capped at `limit` documents.
    #[must_use]
    pub fn new(field: impl Into<String>, direction: Direction, limit: usize) -> Self {
        Self {
            order_by: field.into(),
            direction,
            limit,
        }
    }
}

/// A document: id plus opaque fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    /// Create a record.
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Split a serializable item into a record, using its `id` field as the document id.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidRecord`] if the item does not serialize
    /// to an object with a string `id`.
    pub fn from_item<T: Serialize>(item: &T) -> Result<Self, RemoteError> {
        let mut fields = to_fields(item)?;
        match fields.remove("id") {
            Some(Value::String(id)) => Ok(Self { id, fields }),
            _ => Err(RemoteError::InvalidRecord("missing string id".to_string())),
        }
    }

    /// Decode the record into a typed item, with the id merged into the fields.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields))
    }

    /// The record as a single JSON object including its id.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        fields.insert("id".to_string(), Value::String(self.id));
        Value::Object(fields)
    }
}

/// Serialize a payload into a field map.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidRecord`] if `item` is not a JSON object.
pub fn to_fields<T: Serialize>(item: &T) -> Result<Fields, RemoteError> {
    match serde_json::to_value(item)? {
        Value::Object(fields) => Ok(fields),
        other => Err(RemoteError::InvalidRecord(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Event pushed by a subscription.
#[derive(Debug)]
pub enum SnapshotEvent {
    /// Full replacement of the query result.
    Snapshot(Vec<Record>),
    /// The subscription failed; more events may follow once it recovers.
    Error(RemoteError),
}

/// Live stream of snapshot events.
///
/// Dropping the subscription cancels the producer.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    producer: Option<AbortHandle>,
}

impl Subscription {
    /// Wrap a receiver, optionally owning the task that feeds it.
    #[must_use]
    pub const fn new(
        events: mpsc::UnboundedReceiver<SnapshotEvent>,
        producer: Option<AbortHandle>,
    ) -> Self {
        Self { events, producer }
    }

    /// Wait for the next event. `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

/// A remote document collection.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Collection name (e.g. `products`).
    fn name(&self) -> &str;

    /// Register a live query. The first event carries the current result.
    fn subscribe(&self, query: &CollectionQuery) -> Subscription;

    /// Create a document and return its id.
    async fn create(&self, fields: Fields) -> Result<String, RemoteError>;

    /// Merge `fields` into an existing document.
    async fn update(&self, id: &str, fields: Fields) -> Result<(), RemoteError>;

    /// Delete a document.
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}
