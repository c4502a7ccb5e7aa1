//! In-process document collection.
//!
//! Behaves like the hosted collection from the stores' point of view:
//! every write pushes a fresh snapshot to each live subscription. Used when
//! no remote is configured and throughout the tests, where it also offers
//! failure injection.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CollectionQuery, Direction, Fields, Record, RemoteCollection, RemoteError, SnapshotEvent,
    Subscription,
};

struct Watcher {
    query: CollectionQuery,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

#[derive(Default)]
struct MemoryInner {
    documents: Vec<Record>,
    watchers: Vec<Watcher>,
    fail_writes: Option<String>,
}

/// In-memory [`RemoteCollection`].
pub struct MemoryCollection {
    name: String,
    inner: Mutex<MemoryInner>,
    create_calls: AtomicUsize,
}

impl MemoryCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(MemoryInner::default()),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Create a collection pre-populated with `records`.
    #[must_use]
    pub fn with_records(name: impl Into<String>, records: Vec<Record>) -> Self {
        let collection = Self::new(name);
        collection.lock().documents = records;
        collection
    }

    /// Number of `create` calls received, successful or not.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(AtomicOrdering::SeqCst)
    }

    /// Current documents in insertion order.
    #[must_use]
    pub fn documents(&self) -> Vec<Record> {
        self.lock().documents.clone()
    }

    /// Make every subsequent write fail with `reason`, or succeed again with `None`.
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.lock().fail_writes = reason.map(str::to_owned);
    }

    /// Push a subscription error to every live subscription.
    pub fn emit_error(&self, message: &str) {
        let mut inner = self.lock();
        inner.watchers.retain(|watcher| {
            watcher
                .tx
                .send(SnapshotEvent::Error(RemoteError::Unavailable(
                    message.to_string(),
                )))
                .is_ok()
        });
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(inner: &MemoryInner) -> Result<(), RemoteError> {
        match &inner.fail_writes {
            Some(reason) => Err(RemoteError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    /// Push the current result of each watcher's query, dropping closed watchers.
    fn publish(inner: &mut MemoryInner) {
        let MemoryInner {
            documents,
            watchers,
            ..
        } = inner;
        watchers.retain(|watcher| {
            let snapshot = run_query(documents, &watcher.query);
            watcher.tx.send(SnapshotEvent::Snapshot(snapshot)).is_ok()
        });
    }
}

#[async_trait]
impl RemoteCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, query: &CollectionQuery) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let snapshot = run_query(&inner.documents, query);
        if tx.send(SnapshotEvent::Snapshot(snapshot)).is_ok() {
            inner.watchers.push(Watcher {
                query: query.clone(),
                tx,
            });
        }
        debug!(collection = %self.name, watchers = inner.watchers.len(), "Subscription registered");
        Subscription::new(rx, None)
    }

    async fn create(&self, fields: Fields) -> Result<String, RemoteError> {
        self.create_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut inner = self.lock();
        Self::check_writable(&inner)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        inner.documents.push(Record::new(id.clone(), fields));
        Self::publish(&mut inner);
        Ok(id)
    }

    async fn update(&self, id: &str, fields: Fields) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        Self::check_writable(&inner)?;
        let record = inner
            .documents
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        record.fields.extend(fields);
        Self::publish(&mut inner);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        Self::check_writable(&inner)?;
        let before = inner.documents.len();
        inner.documents.retain(|record| record.id != id);
        if inner.documents.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Self::publish(&mut inner);
        Ok(())
    }
}

/// Order and cap `documents` the way the hosted collection would.
///
/// Documents missing the order field sort after the others.
fn run_query(documents: &[Record], query: &CollectionQuery) -> Vec<Record> {
    let mut sorted: Vec<Record> = documents.to_vec();
    sorted.sort_by(|a, b| {
        let left = a.fields.get(&query.order_by);
        let right = b.fields.get(&query.order_by);
        match (left, right) {
            (Some(l), Some(r)) => {
                let ordering = compare_values(l, r);
                match query.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    sorted.truncate(query.limit);
    sorted
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            let l = l.as_f64().unwrap_or(0.0);
            let r = r.as_f64().unwrap_or(0.0);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::remote::to_fields;

    fn record(id: &str, name: &str) -> Record {
        Record::new(id, to_fields(&json!({ "name": name })).unwrap())
    }

    fn names(event: Option<SnapshotEvent>) -> Vec<String> {
        match event {
            Some(SnapshotEvent::Snapshot(records)) => records
                .into_iter()
                .map(|r| r.fields["name"].as_str().unwrap_or_default().to_string())
                .collect(),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_orders_and_caps() {
        let collection = MemoryCollection::with_records(
            "products",
            vec![record("1", "b"), record("2", "c"), record("3", "a")],
        );
        let mut sub =
            collection.subscribe(&CollectionQuery::new("name", Direction::Descending, 2));
        assert_eq!(names(sub.next().await), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_writes_push_snapshots() {
        let collection = MemoryCollection::new("products");
        let mut sub = collection.subscribe(&CollectionQuery::new("name", Direction::Ascending, 10));
        assert!(names(sub.next().await).is_empty());

        let id = collection
            .create(to_fields(&json!({"name": "x"})).unwrap())
            .await
            .unwrap();
        assert_eq!(names(sub.next().await), vec!["x"]);

        collection
            .update(&id, to_fields(&json!({"name": "y"})).unwrap())
            .await
            .unwrap();
        assert_eq!(names(sub.next().await), vec!["y"]);

        collection.delete(&id).await.unwrap();
        assert!(names(sub.next().await).is_empty());
        assert_eq!(collection.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_writes_do_not_publish() {
        let collection = MemoryCollection::new("orders");
        collection.fail_writes(Some("offline"));
        let err = collection
            .create(to_fields(&json!({"name": "x"})).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
        assert!(collection.documents().is_empty());
        assert_eq!(collection.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let collection = MemoryCollection::new("orders");
        let err = collection.update("nope", Fields::new()).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_emit_error_reaches_subscribers() {
        let collection = MemoryCollection::new("orders");
        let mut sub = collection.subscribe(&CollectionQuery::new("name", Direction::Ascending, 10));
        let _ = sub.next().await;
        collection.emit_error("connection lost");
        assert!(matches!(sub.next().await, Some(SnapshotEvent::Error(_))));
    }
}
