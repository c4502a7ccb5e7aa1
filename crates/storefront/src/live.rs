//! Live snapshot of a remote collection.
//!
//! [`LiveCollection`] is the engine behind the catalog and order stores:
//!
//! 1. A background listener consumes the collection's [`Subscription`]
//! 2. Every snapshot replaces the in-memory list wholesale and is published
//!    through a `watch` channel as an immutable [`LiveState`]
//! 3. The same snapshot is written to the local mirror; mirror failures are
//!    logged and dropped
//! 4. A subscription error flags the state and restores the list from the
//!    mirror when it holds anything
//!
//! Writes go straight to the remote and never touch the in-memory state.
//! The next snapshot is the only path back to what readers see.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use corner_shop_core::OrderStatus;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::mirror::LocalMirror;
use crate::remote::{CollectionQuery, Fields, Record, RemoteCollection, RemoteError, SnapshotEvent};

/// Errors from store mutations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Item type held by a [`LiveCollection`].
pub trait LiveItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Category used to derive the distinct category list, if the item has one.
    fn category(&self) -> Option<&str> {
        None
    }
}

/// Where a live collection reads from and mirrors to.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    /// Subscription query.
    pub query: CollectionQuery,
    /// Mirror store for the item list.
    pub mirror_store: &'static str,
    /// Mirror store for the derived category list, if mirrored.
    pub categories_store: Option<&'static str>,
}

/// Immutable view of a live collection at one point in time.
#[derive(Debug, Clone)]
pub struct LiveState<T> {
    /// Items in query order.
    pub items: Arc<Vec<T>>,
    /// Distinct non-empty categories in first-seen order.
    pub categories: Arc<Vec<String>>,
    /// True until the first snapshot, error or mirror restore.
    pub loading: bool,
    /// Last subscription or write error, cleared by the next snapshot.
    pub error: Option<String>,
    /// When the last live snapshot arrived.
    pub last_fetched: Option<DateTime<Utc>>,
    /// Whether `items` came from the mirror rather than a live snapshot.
    pub from_mirror: bool,
    /// Incremented every time `items` is replaced.
    pub version: u64,
}

impl<T> Default for LiveState<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            categories: Arc::new(Vec::new()),
            loading: true,
            error: None,
            last_fetched: None,
            from_mirror: false,
            version: 0,
        }
    }
}

impl<T> LiveState<T> {
    /// Whether the view is backed by a healthy live subscription.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        !self.loading && self.error.is_none() && !self.from_mirror
    }
}

/// Handle to a running listener. Dropping it cancels the subscription.
#[derive(Debug)]
pub struct SubscriptionGuard {
    handle: JoinHandle<()>,
}

impl SubscriptionGuard {
    /// Cancel the listener now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A live, mirrored snapshot of one remote collection.
pub struct LiveCollection<T> {
    inner: Arc<LiveInner<T>>,
}

impl<T> Clone for LiveCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct LiveInner<T> {
    spec: CollectionSpec,
    remote: Arc<dyn RemoteCollection>,
    mirror: Option<Arc<dyn LocalMirror>>,
    state: watch::Sender<Arc<LiveState<T>>>,
}

impl<T: LiveItem> LiveCollection<T> {
    /// Create a collection in the loading state. Nothing happens until [`Self::attach`].
    #[must_use]
    pub fn new(
        spec: CollectionSpec,
        remote: Arc<dyn RemoteCollection>,
        mirror: Option<Arc<dyn LocalMirror>>,
    ) -> Self {
        let (state, _) = watch::channel(Arc::new(LiveState::default()));
        Self {
            inner: Arc::new(LiveInner {
                spec,
                remote,
                mirror,
                state,
            }),
        }
    }

    /// Remote collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.remote.name()
    }

    /// The remote this collection writes to.
    #[must_use]
    pub fn remote(&self) -> &Arc<dyn RemoteCollection> {
        &self.inner.remote
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> Arc<LiveState<T>> {
        Arc::clone(&self.inner.state.borrow())
    }

    /// Receiver notified on every state replacement.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<LiveState<T>>> {
        self.inner.state.subscribe()
    }

    /// Start listening to the remote subscription in the background.
    pub fn attach(&self) -> SubscriptionGuard {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let mut subscription = this.inner.remote.subscribe(&this.inner.spec.query);
            info!(collection = %this.name(), "Subscription attached");
            while let Some(event) = subscription.next().await {
                match event {
                    SnapshotEvent::Snapshot(records) => this.apply_snapshot(records).await,
                    SnapshotEvent::Error(e) => this.apply_error(&e).await,
                }
            }
            debug!(collection = %this.name(), "Subscription closed by remote");
        });
        SubscriptionGuard { handle }
    }

    /// Replace the state with a snapshot and mirror it.
    pub async fn apply_snapshot(&self, records: Vec<Record>) {
        let total = records.len();
        let items: Vec<T> = records
            .iter()
            .filter_map(|record| match record.decode::<T>() {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(
                        collection = %self.name(),
                        id = %record.id,
                        error = %e,
                        "Skipping undecodable record"
                    );
                    None
                }
            })
            .collect();
        let categories = distinct_categories(&items);

        let items = Arc::new(items);
        let categories = Arc::new(categories);
        self.replace(|previous| LiveState {
            items: Arc::clone(&items),
            categories: Arc::clone(&categories),
            loading: false,
            error: None,
            last_fetched: Some(Utc::now()),
            from_mirror: false,
            version: previous.version + 1,
        });
        debug!(collection = %self.name(), total, kept = items.len(), "Snapshot applied");

        self.write_mirror(&items, &categories).await;
    }

    /// Flag a subscription error and fall back to the mirror.
    pub async fn apply_error(&self, err: &RemoteError) {
        error!(collection = %self.name(), error = %err, "Subscription error");
        let message = err.to_string();

        match self.read_mirror().await {
            Some((items, categories)) => {
                info!(
                    collection = %self.name(),
                    count = items.len(),
                    "Restored from local mirror"
                );
                let items = Arc::new(items);
                let categories = Arc::new(categories);
                self.replace(|previous| LiveState {
                    items: Arc::clone(&items),
                    categories: Arc::clone(&categories),
                    loading: false,
                    error: Some(message.clone()),
                    last_fetched: previous.last_fetched,
                    from_mirror: true,
                    version: previous.version + 1,
                });
            }
            None => self.replace(|previous| LiveState {
                loading: false,
                error: Some(message.clone()),
                ..previous.clone()
            }),
        }
    }

    /// Record a failed write on the state without touching the items.
    pub fn flag_error(&self, err: &dyn std::fmt::Display) {
        let message = err.to_string();
        self.replace(|previous| LiveState {
            error: Some(message.clone()),
            ..previous.clone()
        });
    }

    /// Create a document.
    ///
    /// # Errors
    ///
    /// Returns the remote error after flagging it on the state.
    pub async fn create(&self, fields: Fields) -> Result<String, RemoteError> {
        let result = self.inner.remote.create(fields).await;
        self.record_write("create", result)
    }

    /// Merge fields into a document.
    ///
    /// # Errors
    ///
    /// Returns the remote error after flagging it on the state.
    pub async fn update(&self, id: &str, fields: Fields) -> Result<(), RemoteError> {
        let result = self.inner.remote.update(id, fields).await;
        self.record_write("update", result)
    }

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns the remote error after flagging it on the state.
    pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let result = self.inner.remote.delete(id).await;
        self.record_write("delete", result)
    }

    fn record_write<R>(
        &self,
        operation: &str,
        result: Result<R, RemoteError>,
    ) -> Result<R, RemoteError> {
        if let Err(e) = &result {
            error!(collection = %self.name(), operation, error = %e, "Remote write failed");
            self.flag_error(e);
        }
        result
    }

    fn replace(&self, next: impl FnOnce(&LiveState<T>) -> LiveState<T>) {
        self.inner.state.send_modify(|current| {
            *current = Arc::new(next(current));
        });
    }

    async fn write_mirror(&self, items: &[T], categories: &[String]) {
        let Some(mirror) = &self.inner.mirror else {
            return;
        };

        let records: Vec<Value> = items
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect();
        if let Err(e) = mirror.put(self.inner.spec.mirror_store, records).await {
            warn!(collection = %self.name(), error = %e, "Failed to mirror snapshot");
        }

        if let Some(store) = self.inner.spec.categories_store {
            let records = categories.iter().map(|name| json!({ "name": name })).collect();
            if let Err(e) = mirror.put(store, records).await {
                warn!(collection = %self.name(), error = %e, "Failed to mirror categories");
            }
        }
    }

    /// Read the mirrored list. `None` when there is no mirror or it is empty.
    async fn read_mirror(&self) -> Option<(Vec<T>, Vec<String>)> {
        let mirror = self.inner.mirror.as_ref()?;

        let records = match mirror.get_all(self.inner.spec.mirror_store).await {
            Ok(records) => records,
            Err(e) => {
                warn!(collection = %self.name(), error = %e, "Failed to read local mirror");
                return None;
            }
        };
        let items: Vec<T> = records
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if items.is_empty() {
            return None;
        }

        let mut categories = match self.inner.spec.categories_store {
            Some(store) => mirror
                .get_all(store)
                .await
                .unwrap_or_default()
                .into_iter()
                .filter_map(|value| value.get("name")?.as_str().map(str::to_owned))
                .collect(),
            None => Vec::new(),
        };
        if categories.is_empty() {
            categories = distinct_categories(&items);
        }

        Some((items, categories))
    }
}

/// Distinct non-empty categories in first-seen order.
fn distinct_categories<T: LiveItem>(items: &[T]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for category in items.iter().filter_map(LiveItem::category) {
        if !category.is_empty() && !seen.iter().any(|c| c == category) {
            seen.push(category.to_string());
        }
    }
    seen
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;
    use crate::mirror::{FileMirror, MirrorError};
    use crate::remote::{Direction, MemoryCollection, to_fields};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        kind: String,
    }

    impl LiveItem for Item {
        fn category(&self) -> Option<&str> {
            Some(&self.kind)
        }
    }

    fn spec() -> CollectionSpec {
        CollectionSpec {
            query: CollectionQuery::new("kind", Direction::Ascending, 50),
            mirror_store: "items",
            categories_store: Some("kinds"),
        }
    }

    fn record(id: &str, kind: &str) -> Record {
        Record::new(id, to_fields(&json!({ "kind": kind })).unwrap())
    }

    fn ids(state: &LiveState<Item>) -> Vec<&str> {
        state.items.iter().map(|item| item.id.as_str()).collect()
    }

    /// Mirror that fails every call.
    struct BrokenMirror;

    #[async_trait]
    impl LocalMirror for BrokenMirror {
        async fn put(&self, store: &str, _records: Vec<Value>) -> Result<(), MirrorError> {
            Err(MirrorError::InvalidStore(store.to_string()))
        }

        async fn get_all(&self, store: &str) -> Result<Vec<Value>, MirrorError> {
            Err(MirrorError::InvalidStore(store.to_string()))
        }
    }

    /// Mirror that records writes in memory.
    #[derive(Default)]
    struct RecordingMirror {
        stores: Mutex<std::collections::HashMap<String, Vec<Value>>>,
    }

    #[async_trait]
    impl LocalMirror for RecordingMirror {
        async fn put(&self, store: &str, records: Vec<Value>) -> Result<(), MirrorError> {
            self.stores.lock().unwrap().insert(store.to_string(), records);
            Ok(())
        }

        async fn get_all(&self, store: &str) -> Result<Vec<Value>, MirrorError> {
            Ok(self.stores.lock().unwrap().get(store).cloned().unwrap_or_default())
        }
    }

    fn collection(mirror: Option<Arc<dyn LocalMirror>>) -> LiveCollection<Item> {
        LiveCollection::new(spec(), Arc::new(MemoryCollection::new("items")), mirror)
    }

    #[tokio::test]
    async fn test_snapshot_replaces_state() {
        let live = collection(None);
        assert!(live.state().loading);

        live.apply_snapshot(vec![record("a", "x"), record("b", "y"), record("c", "x")])
            .await;
        let state = live.state();
        assert_eq!(ids(&state), vec!["a", "b", "c"]);
        assert_eq!(*state.categories, vec!["x".to_string(), "y".to_string()]);
        assert!(state.is_ready());
        assert_eq!(state.version, 1);

        live.apply_snapshot(vec![record("d", "z")]).await;
        assert_eq!(ids(&live.state()), vec!["d"]);
        assert_eq!(live.state().version, 2);
    }

    #[tokio::test]
    async fn test_undecodable_records_are_skipped() {
        let live = collection(None);
        let bad = Record::new("bad", to_fields(&json!({ "kind": 3 })).unwrap());
        live.apply_snapshot(vec![record("a", "x"), bad]).await;
        assert_eq!(ids(&live.state()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_error_restores_from_mirror() {
        let mirror: Arc<dyn LocalMirror> = Arc::new(RecordingMirror::default());
        let live = collection(Some(Arc::clone(&mirror)));
        live.apply_snapshot(vec![record("a", "x"), record("b", "y")]).await;

        let fresh = collection(Some(mirror));
        fresh
            .apply_error(&RemoteError::Unavailable("offline".to_string()))
            .await;

        let state = fresh.state();
        assert_eq!(ids(&state), vec!["a", "b"]);
        assert_eq!(*state.categories, vec!["x".to_string(), "y".to_string()]);
        assert!(state.from_mirror);
        assert!(!state.loading);
        assert!(state.error.as_deref().unwrap().contains("offline"));
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_error_with_empty_mirror_keeps_list() {
        let dir = tempfile::tempdir().unwrap();
        let mirror: Arc<dyn LocalMirror> = Arc::new(FileMirror::open(dir.path()).await.unwrap());
        let live = collection(Some(mirror));

        live.apply_error(&RemoteError::Unavailable("offline".to_string()))
            .await;
        let state = live.state();
        assert!(state.items.is_empty());
        assert!(state.error.is_some());
        assert!(!state.from_mirror);
    }

    #[tokio::test]
    async fn test_mirror_failures_are_swallowed() {
        let live = collection(Some(Arc::new(BrokenMirror)));
        live.apply_snapshot(vec![record("a", "x")]).await;
        assert!(live.state().is_ready());

        live.apply_error(&RemoteError::Unavailable("offline".to_string()))
            .await;
        assert_eq!(ids(&live.state()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_writes_do_not_touch_state() {
        let remote = Arc::new(MemoryCollection::new("items"));
        let live: LiveCollection<Item> = LiveCollection::new(spec(), remote.clone(), None);
        live.apply_snapshot(Vec::new()).await;

        live.create(to_fields(&json!({ "kind": "x" })).unwrap())
            .await
            .unwrap();
        assert!(live.state().items.is_empty());
        assert_eq!(remote.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_flags_error() {
        let remote = Arc::new(MemoryCollection::new("items"));
        remote.fail_writes(Some("read-only"));
        let live: LiveCollection<Item> = LiveCollection::new(spec(), remote, None);
        live.apply_snapshot(vec![record("a", "x")]).await;

        assert!(live.delete("a").await.is_err());
        let state = live.state();
        assert!(state.error.is_some());
        assert_eq!(ids(&state), vec!["a"]);
    }

    #[tokio::test]
    async fn test_attach_follows_remote_and_stops_on_drop() {
        let remote = Arc::new(MemoryCollection::with_records(
            "items",
            vec![record("a", "x")],
        ));
        let live: LiveCollection<Item> = LiveCollection::new(spec(), remote.clone(), None);
        let mut rx = live.watch();

        let guard = live.attach();
        rx.changed().await.unwrap();
        assert_eq!(ids(&rx.borrow_and_update()), vec!["a"]);

        remote
            .create(to_fields(&json!({ "kind": "y" })).unwrap())
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().items.len(), 2);

        drop(guard);
        tokio::task::yield_now().await;
        remote
            .create(to_fields(&json!({ "kind": "z" })).unwrap())
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(live.state().items.len(), 2);
    }
}
