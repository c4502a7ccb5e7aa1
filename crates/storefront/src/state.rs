//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::CartAggregator;
use crate::catalog::{CatalogOptions, CatalogStore, SearchEngine};
use crate::config::StorefrontConfig;
use crate::live::SubscriptionGuard;
use crate::mirror::LocalMirror;
use crate::notify::Notifier;
use crate::orders::OrderStore;
use crate::remote::RemoteCollection;

/// Remote collections the storefront is built on.
pub struct Remotes {
    pub products: Arc<dyn RemoteCollection>,
    pub orders: Arc<dyn RemoteCollection>,
}

/// Subscriptions kept alive for as long as the value is held.
#[derive(Debug)]
pub struct Attached {
    pub catalog: SubscriptionGuard,
    pub orders: SubscriptionGuard,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// stores, the search engine and the cart.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: CatalogStore,
    orders: OrderStore,
    search: SearchEngine,
    cart: CartAggregator,
    notifier: Notifier,
}

impl AppState {
    /// Create a new application state. Nothing is subscribed until [`Self::attach`].
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        remotes: Remotes,
        mirror: Option<Arc<dyn LocalMirror>>,
    ) -> Self {
        let tunables = config.catalog;
        let catalog = CatalogStore::new(
            remotes.products,
            mirror.clone(),
            CatalogOptions {
                limit: tunables.products_limit,
            },
        );
        let orders = OrderStore::new(remotes.orders, mirror, tunables.orders_limit);
        let notifier = Notifier::default();
        let cart = CartAggregator::new(notifier.clone(), tunables.max_line_qty);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                orders,
                search: SearchEngine::new(tunables.search_debounce),
                cart,
                notifier,
            }),
        }
    }

    /// Start following both collections.
    #[must_use]
    pub fn attach(&self) -> Attached {
        Attached {
            catalog: self.inner.catalog.attach(),
            orders: self.inner.orders.attach(),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogStore {
        &self.inner.catalog
    }

    #[must_use]
    pub fn orders(&self) -> &OrderStore {
        &self.inner.orders
    }

    #[must_use]
    pub fn search(&self) -> &SearchEngine {
        &self.inner.search
    }

    #[must_use]
    pub fn cart(&self) -> &CartAggregator {
        &self.inner.cart
    }

    /// Notifications raised by the cart.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
