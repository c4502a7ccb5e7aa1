//! Order tracking.
//!
//! [`OrderStore`] keeps a live, mirrored snapshot of the most recent orders,
//! newest first. Status changes are validated against the order as last
//! seen in that snapshot before anything is written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use corner_shop_core::{CartLine, NewOrder, Order, OrderId, OrderStatus, Price, StatusFilter};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::live::{CollectionSpec, LiveCollection, LiveItem, LiveState, StoreError, SubscriptionGuard};
use crate::mirror::LocalMirror;
use crate::remote::{CollectionQuery, Direction, RemoteCollection, to_fields};

/// Mirror store holding the order list.
pub const ORDERS_STORE: &str = "orders";

impl LiveItem for Order {}

/// Partial order update. Only the fields that are set are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_list: Option<Vec<CartLine>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StampedPatch<'a> {
    #[serde(flatten)]
    patch: &'a OrderPatch,
    last_updated: DateTime<Utc>,
}

/// Live order list.
#[derive(Clone)]
pub struct OrderStore {
    live: LiveCollection<Order>,
}

impl OrderStore {
    /// Create a store over `remote` showing the newest `limit` orders.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCollection>,
        mirror: Option<Arc<dyn LocalMirror>>,
        limit: usize,
    ) -> Self {
        let spec = CollectionSpec {
            query: CollectionQuery::new("createdAt", Direction::Descending, limit),
            mirror_store: ORDERS_STORE,
            categories_store: None,
        };
        Self {
            live: LiveCollection::new(spec, remote, mirror),
        }
    }

    /// Underlying live collection.
    #[must_use]
    pub const fn live(&self) -> &LiveCollection<Order> {
        &self.live
    }

    /// Start following the remote collection.
    pub fn attach(&self) -> SubscriptionGuard {
        self.live.attach()
    }

    /// Current order state.
    #[must_use]
    pub fn state(&self) -> Arc<LiveState<Order>> {
        self.live.state()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<LiveState<Order>>> {
        self.live.watch()
    }

    /// Orders passing `filter`, newest first.
    #[must_use]
    pub fn filtered(&self, filter: StatusFilter) -> Vec<Order> {
        self.state()
            .items
            .iter()
            .filter(|order| filter.matches(order.status))
            .cloned()
            .collect()
    }

    /// Look up an order in the current snapshot.
    #[must_use]
    pub fn find(&self, id: &OrderId) -> Option<Order> {
        self.state().items.iter().find(|order| &order.id == id).cloned()
    }

    /// Create an order.
    ///
    /// # Errors
    ///
    /// Returns the remote error (also flagged on the state).
    #[instrument(skip(self, order), fields(lines = order.products_list.len(), total = %order.total))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<OrderId, StoreError> {
        let id = self.live.create(to_fields(order)?).await?;
        info!(order_id = %id, "Order created");
        Ok(OrderId::new(id))
    }

    /// Merge `patch` into an order, stamping `lastUpdated`.
    ///
    /// A status in the patch is validated like [`Self::set_status`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an empty patch, a transition error
    /// for a forbidden status change, or the remote error.
    #[instrument(skip(self, patch), fields(order_id = %id))]
    pub async fn update_order(&self, id: &OrderId, patch: OrderPatch) -> Result<(), StoreError> {
        if patch == OrderPatch::default() {
            return Err(StoreError::Invalid("nothing to update".to_string()));
        }
        if let Some(next) = patch.status {
            self.check_transition(id, next)?;
        }
        let fields = to_fields(&StampedPatch {
            patch: &patch,
            last_updated: Utc::now(),
        })?;
        self.live.update(id.as_str(), fields).await?;
        Ok(())
    }

    /// Move an order to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an order missing from the
    /// snapshot, [`StoreError::InvalidTransition`] when leaving a terminal
    /// state or staying in the same one, or the remote error.
    pub async fn set_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let patch = OrderPatch {
            status: Some(status),
            ..OrderPatch::default()
        };
        self.update_order(id, patch).await?;
        info!(order_id = %id, %status, "Order status changed");
        Ok(())
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns the remote error (also flagged on the state).
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete_order(&self, id: &OrderId) -> Result<(), StoreError> {
        self.live.delete(id.as_str()).await?;
        Ok(())
    }

    fn check_transition(&self, id: &OrderId, next: OrderStatus) -> Result<(), StoreError> {
        let current = self
            .find(id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?
            .status;
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition {
                from: current,
                to: next,
            })
        }
    }
}
