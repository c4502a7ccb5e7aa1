//! Shopping cart.
//!
//! [`Cart`] is the pure line bookkeeping; [`CartAggregator`] wraps it with
//! the quantity policy, notifications and checkout against the order store.
//!
//! # Invariants
//!
//! - At most one line per product id
//! - No line has `qty == 0`
//! - Every line's composition has exactly `qty` units numbered `1..=qty`

mod quote;

pub use quote::{CheckoutQuote, QuotePolicy};

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use corner_shop_core::{CartLine, NewOrder, OrderId, Price, Product, ProductId};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::catalog::compose;
use crate::live::StoreError;
use crate::notify::Notifier;
use crate::orders::OrderStore;

/// Largest quantity a single line may hold unless configured otherwise.
pub const DEFAULT_MAX_LINE_QTY: u32 = 50;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("No cart line for product {0}")]
    LineNotFound(ProductId),

    #[error("Checkout already in progress")]
    CheckoutInProgress,

    #[error("Could not place order: {0}")]
    Order(#[from] StoreError),
}

/// Ordered cart lines keyed by product id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Line for `id`, if any.
    #[must_use]
    pub fn line(&self, id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product.id == id)
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.qty).sum()
    }

    /// Sum of price times quantity over every line.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Set the quantity of `product`'s line, creating it if needed.
    ///
    /// An existing line keeps its product snapshot and reconciles its
    /// composition; a new line starts from the product's own composition when
    /// it ships one. A quantity of zero removes the line.
    pub fn upsert(&mut self, product: &Product, qty: u32) {
        match self.lines.iter_mut().find(|line| line.product.id == product.id) {
            Some(line) => {
                line.smart_composition = compose(&line.product, Some(&line.smart_composition), qty);
                line.qty = qty;
            }
            None => self.lines.push(CartLine {
                product: product.clone(),
                qty,
                smart_composition: compose(product, product.smart_composition.as_deref(), qty),
            }),
        }
        self.lines.retain(|line| line.qty > 0);
    }

    /// Remove the line for `id`, returning it.
    pub fn remove(&mut self, id: &ProductId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| &line.product.id == id)?;
        Some(self.lines.remove(index))
    }

    /// Remove the lines of a placed order.
    ///
    /// Lines added or changed since the order was taken stay in the cart.
    pub fn remove_ordered(&mut self, ordered: &[CartLine]) {
        self.lines.retain(|line| !ordered.contains(line));
    }
}

/// Read-only view of the cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub total: Price,
}

impl From<&Cart> for CartSummary {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.lines.clone(),
            item_count: cart.item_count(),
            total: cart.total(),
        }
    }
}

/// Shared cart with quantity policy, notifications and checkout.
pub struct CartAggregator {
    cart: Mutex<Cart>,
    checkout_gate: tokio::sync::Mutex<()>,
    notifier: Notifier,
    max_qty: u32,
    quote_policy: QuotePolicy,
}

impl CartAggregator {
    /// Create an empty cart capping lines at `max_qty` units.
    #[must_use]
    pub fn new(notifier: Notifier, max_qty: u32) -> Self {
        Self {
            cart: Mutex::new(Cart::default()),
            checkout_gate: tokio::sync::Mutex::new(()),
            notifier,
            max_qty: max_qty.max(1),
            quote_policy: QuotePolicy::default(),
        }
    }

    /// Replace the checkout pricing rules.
    #[must_use]
    pub const fn with_quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.quote_policy = policy;
        self
    }

    /// Notifier the cart reports through.
    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Largest quantity a line may hold.
    #[must_use]
    pub const fn max_qty(&self) -> u32 {
        self.max_qty
    }

    /// Snapshot of the cart.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary::from(&*self.lock())
    }

    /// Quote the current cart.
    #[must_use]
    pub fn quote(&self, points: u64, balance: u64) -> CheckoutQuote {
        let subtotal = self.lock().total();
        self.quote_policy.quote(subtotal, points, balance)
    }

    /// Set `product`'s line to `qty` units (capped at the maximum).
    pub fn add_to_cart(&self, product: &Product, qty: u32) {
        let qty = qty.min(self.max_qty);
        let mut cart = self.lock();
        let had_line = cart.line(&product.id).is_some();
        cart.upsert(product, qty);
        drop(cart);

        if qty > 0 {
            info!(product_id = %product.id, qty, "Added to cart");
            self.notifier.success(format!("{} added to cart", product.name));
        } else if had_line {
            info!(product_id = %product.id, "Removed from cart");
            self.notifier.info(format!("{} removed from cart", product.name));
        }
    }

    /// Drop `id`'s line. Returns whether a line was removed.
    pub fn remove_from_cart(&self, id: &ProductId) -> bool {
        let removed = self.lock().remove(id);
        if let Some(line) = removed {
            info!(product_id = %id, "Removed from cart");
            self.notifier.info(format!("{} removed from cart", line.product.name));
            true
        } else {
            self.notifier.warning("That item is not in your cart");
            false
        }
    }

    /// Change the quantity of an existing line.
    ///
    /// Values below one remove the line; values above the maximum are capped.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if the product is not in the cart.
    pub fn update_quantity(&self, id: &ProductId, qty: i64) -> Result<(), CartError> {
        let mut cart = self.lock();
        let Some(product) = cart.line(id).map(|line| line.product.clone()) else {
            drop(cart);
            warn!(product_id = %id, "Quantity change for a product not in the cart");
            self.notifier.warning("That item is not in your cart");
            return Err(CartError::LineNotFound(id.clone()));
        };

        if qty < 1 {
            cart.remove(id);
            drop(cart);
            info!(product_id = %id, "Removed from cart");
            self.notifier.info(format!("{} removed from cart", product.name));
        } else {
            let qty = u32::try_from(qty).unwrap_or(u32::MAX).min(self.max_qty);
            cart.upsert(&product, qty);
            drop(cart);
            self.notifier.success(format!("{} quantity set to {qty}", product.name));
        }
        Ok(())
    }

    /// Turn the cart into a pending order.
    ///
    /// Only one checkout runs at a time. The ordered lines leave the cart
    /// once the order has been created; anything added meanwhile stays. On
    /// failure the cart is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::EmptyCart`] without contacting the order store,
    /// [`CartError::CheckoutInProgress`] while another checkout is pending,
    /// or [`CartError::Order`] if the order could not be created.
    #[instrument(skip_all)]
    pub async fn checkout(&self, orders: &OrderStore) -> Result<OrderId, CartError> {
        let Ok(_gate) = self.checkout_gate.try_lock() else {
            warn!("Checkout attempted while another is pending");
            self.notifier.warning("Your order is already being placed");
            return Err(CartError::CheckoutInProgress);
        };

        let lines = self.lock().lines().to_vec();
        if lines.is_empty() {
            warn!("Checkout attempted with an empty cart");
            self.notifier.warning("Your cart is empty");
            return Err(CartError::EmptyCart);
        }

        let order = NewOrder::from_lines(lines, Utc::now());
        match orders.create_order(&order).await {
            Ok(id) => {
                self.lock().remove_ordered(&order.products_list);
                info!(order_id = %id, total = %order.total, "Checkout complete");
                self.notifier.success("Order placed");
                Ok(id)
            }
            Err(e) => {
                error!(error = %e, "Checkout failed");
                self.notifier.error(format!("Could not place order: {e}"));
                Err(e.into())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use corner_shop_core::CompositionUnit;
    use pretty_assertions::assert_eq;
    use tokio::sync::{Notify, broadcast};

    use super::*;
    use crate::notify::{Notification, NotificationLevel};
    use crate::remote::{
        CollectionQuery, Fields, MemoryCollection, RemoteCollection, RemoteError, Subscription,
    };

    /// Order collection whose creates wait until released.
    struct HeldOrders {
        inner: MemoryCollection,
        entered: Notify,
        release: Notify,
    }

    impl HeldOrders {
        fn new() -> Self {
            Self {
                inner: MemoryCollection::new("orders"),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl RemoteCollection for HeldOrders {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn subscribe(&self, query: &CollectionQuery) -> Subscription {
            self.inner.subscribe(query)
        }

        async fn create(&self, fields: Fields) -> Result<String, RemoteError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.create(fields).await
        }

        async fn update(&self, id: &str, fields: Fields) -> Result<(), RemoteError> {
            self.inner.update(id, fields).await
        }

        async fn delete(&self, id: &str) -> Result<(), RemoteError> {
            self.inner.delete(id).await
        }
    }

    fn product(id: &str, cents: i64) -> Product {
        Product::new(id, format!("Product {id}"), Price::from_cents(cents))
    }

    fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn orders(remote: &Arc<MemoryCollection>) -> OrderStore {
        OrderStore::new(remote.clone(), None, 100)
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::default();
        cart.upsert(&product("a", 1_000), 2);
        cart.upsert(&product("b", 500), 3);
        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.total(), Price::from_cents(3_500));
    }

    #[test]
    fn test_zero_quantity_prunes_line() {
        let mut cart = Cart::default();
        cart.upsert(&product("a", 1_000), 2);
        cart.upsert(&product("a", 1_000), 0);
        assert!(cart.is_empty());

        cart.upsert(&product("b", 500), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_upsert_reconciles_composition() {
        let mut cart = Cart::default();
        let item = product("a", 1_000);
        cart.upsert(&item, 2);
        cart.lines[0].smart_composition[0]
            .customization
            .insert("note".to_string(), serde_json::json!("no onions"));

        cart.upsert(&item, 3);
        let line = cart.line(&item.id).unwrap();
        assert_eq!(line.qty, 3);
        assert_eq!(line.smart_composition.len(), 3);
        assert_eq!(line.smart_composition[0].customization["note"], "no onions");
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_new_line_starts_from_product_composition() {
        let mut item = product("a", 1_000);
        let mut preset = CompositionUnit::fresh(&item, 1);
        preset
            .customization
            .insert("size".to_string(), serde_json::json!("large"));
        item.smart_composition = Some(vec![preset]);

        let mut cart = Cart::default();
        cart.upsert(&item, 2);
        let units = &cart.lines()[0].smart_composition;
        assert_eq!(units[0].customization["size"], "large");
        assert!(units[1].is_default());
    }

    #[test]
    fn test_add_to_cart_notifies() {
        let cart = CartAggregator::new(Notifier::default(), DEFAULT_MAX_LINE_QTY);
        let mut rx = cart.notifier().subscribe();
        cart.add_to_cart(&product("a", 1_000), 2);

        assert_eq!(
            drain(&mut rx),
            vec![Notification::new(
                NotificationLevel::Success,
                "Product a added to cart"
            )]
        );
    }

    #[test]
    fn test_zero_quantity_for_absent_product_is_silent() {
        let cart = CartAggregator::new(Notifier::default(), DEFAULT_MAX_LINE_QTY);
        let mut rx = cart.notifier().subscribe();
        cart.add_to_cart(&product("a", 1_000), 0);

        assert!(cart.summary().lines.is_empty());
        assert!(drain(&mut rx).is_empty());

        cart.add_to_cart(&product("a", 1_000), 1);
        cart.add_to_cart(&product("a", 1_000), 0);
        assert_eq!(
            drain(&mut rx).last(),
            Some(&Notification::new(NotificationLevel::Info, "Product a removed from cart"))
        );
    }

    #[test]
    fn test_remove_from_cart_notifies() {
        let cart = CartAggregator::new(Notifier::default(), DEFAULT_MAX_LINE_QTY);
        let item = product("a", 1_000);
        cart.add_to_cart(&item, 2);
        let mut rx = cart.notifier().subscribe();

        assert!(cart.remove_from_cart(&item.id));
        assert!(!cart.remove_from_cart(&item.id));

        assert_eq!(
            drain(&mut rx),
            vec![
                Notification::new(NotificationLevel::Info, "Product a removed from cart"),
                Notification::new(NotificationLevel::Warning, "That item is not in your cart"),
            ]
        );
    }

    #[test]
    fn test_update_quantity_notifies() {
        let cart = CartAggregator::new(Notifier::default(), DEFAULT_MAX_LINE_QTY);
        let item = product("a", 1_000);
        cart.add_to_cart(&item, 1);
        let mut rx = cart.notifier().subscribe();

        cart.update_quantity(&item.id, 3).unwrap();
        cart.update_quantity(&item.id, 0).unwrap();
        cart.update_quantity(&item.id, 1).unwrap_err();

        assert_eq!(
            drain(&mut rx),
            vec![
                Notification::new(NotificationLevel::Success, "Product a quantity set to 3"),
                Notification::new(NotificationLevel::Info, "Product a removed from cart"),
                Notification::new(NotificationLevel::Warning, "That item is not in your cart"),
            ]
        );
    }

    #[test]
    fn test_update_quantity_clamps_and_removes() {
        let cart = CartAggregator::new(Notifier::default(), 50);
        let item = product("a", 1_000);
        cart.add_to_cart(&item, 1);

        cart.update_quantity(&item.id, 80).unwrap();
        assert_eq!(cart.summary().lines[0].qty, 50);
        assert_eq!(cart.summary().lines[0].smart_composition.len(), 50);

        cart.update_quantity(&item.id, -3).unwrap();
        assert!(cart.summary().lines.is_empty());

        assert!(matches!(
            cart.update_quantity(&item.id, 2),
            Err(CartError::LineNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_checkout_warns_without_writing() {
        let remote = Arc::new(MemoryCollection::new("orders"));
        let cart = CartAggregator::new(Notifier::default(), 50);
        let mut rx = cart.notifier().subscribe();

        let err = cart.checkout(&orders(&remote)).await.unwrap_err();

        assert!(matches!(err, CartError::EmptyCart));
        assert_eq!(remote.create_calls(), 0);
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].level, NotificationLevel::Warning);
    }

    #[tokio::test]
    async fn test_checkout_creates_order_and_clears() {
        let remote = Arc::new(MemoryCollection::new("orders"));
        let cart = CartAggregator::new(Notifier::default(), 50);
        cart.add_to_cart(&product("a", 1_000), 2);
        cart.add_to_cart(&product("b", 500), 3);
        let mut rx = cart.notifier().subscribe();

        let id = cart.checkout(&orders(&remote)).await.unwrap();

        let documents = remote.documents();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, id.as_str());
        assert_eq!(documents[0].fields["total"], serde_json::json!(35.0));
        assert_eq!(documents[0].fields["status"], "pending");
        assert!(cart.summary().lines.is_empty());
        assert_eq!(drain(&mut rx)[0].level, NotificationLevel::Success);
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart() {
        let remote = Arc::new(MemoryCollection::new("orders"));
        remote.fail_writes(Some("offline"));
        let cart = CartAggregator::new(Notifier::default(), 50);
        cart.add_to_cart(&product("a", 1_000), 2);
        let mut rx = cart.notifier().subscribe();

        let err = cart.checkout(&orders(&remote)).await.unwrap_err();

        assert!(matches!(err, CartError::Order(_)));
        assert_eq!(cart.summary().item_count, 2);
        assert_eq!(drain(&mut rx)[0].level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn test_lines_added_during_checkout_stay_in_cart() {
        let remote = Arc::new(HeldOrders::new());
        let store = OrderStore::new(remote.clone(), None, 100);
        let cart = Arc::new(CartAggregator::new(Notifier::default(), 50));
        cart.add_to_cart(&product("a", 1_000), 2);

        let pending = tokio::spawn({
            let cart = Arc::clone(&cart);
            let store = store.clone();
            async move { cart.checkout(&store).await }
        });
        remote.entered.notified().await;

        cart.add_to_cart(&product("b", 500), 1);
        remote.release.notify_one();
        pending.await.unwrap().unwrap();

        let summary = cart.summary();
        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.lines[0].product.id.as_str(), "b");
        let documents = remote.inner.documents();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].fields["total"], serde_json::json!(20.0));
    }

    #[tokio::test]
    async fn test_second_checkout_is_rejected_while_pending() {
        let remote = Arc::new(HeldOrders::new());
        let store = OrderStore::new(remote.clone(), None, 100);
        let cart = Arc::new(CartAggregator::new(Notifier::default(), 50));
        cart.add_to_cart(&product("a", 1_000), 2);

        let pending = tokio::spawn({
            let cart = Arc::clone(&cart);
            let store = store.clone();
            async move { cart.checkout(&store).await }
        });
        remote.entered.notified().await;

        let err = cart.checkout(&store).await.unwrap_err();
        assert!(matches!(err, CartError::CheckoutInProgress));

        remote.release.notify_one();
        pending.await.unwrap().unwrap();
        assert_eq!(remote.inner.create_calls(), 1);
        assert!(cart.summary().lines.is_empty());

        // The gate opens again once the first checkout finishes.
        assert!(matches!(cart.checkout(&store).await, Err(CartError::EmptyCart)));
    }

    #[test]
    fn test_quote_uses_cart_total() {
        let cart = CartAggregator::new(Notifier::default(), 50);
        cart.add_to_cart(&product("a", 1_000), 2);
        cart.add_to_cart(&product("b", 500), 3);

        let quote = cart.quote(100, 5_000);
        assert_eq!(quote.subtotal, Price::from_cents(3_500));
        assert_eq!(quote.total, Price::from_cents(4_400));
    }
}
