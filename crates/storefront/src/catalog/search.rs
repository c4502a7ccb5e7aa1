//! Live search state over the catalog.
//!
//! The raw term follows every keystroke; the debounced term trails it by the
//! configured quiet period and is the one that drives the visible list.
//! Results are memoized per catalog version in a `moka` cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use corner_shop_core::{CategoryFilter, Product};
use moka::sync::Cache;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use super::filter;
use crate::debounce::Debouncer;
use crate::live::LiveState;

/// Maximum number of memoized result lists.
const CACHE_CAPACITY: u64 = 256;

/// Search inputs as the shopper sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// Term as typed.
    pub raw_term: String,
    /// Term the visible list currently reflects.
    pub debounced_term: String,
    pub category: CategoryFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    version: u64,
    term: String,
    category: CategoryFilter,
    available: bool,
}

/// Debounced search plus memoized filtering.
pub struct SearchEngine {
    raw_term: RwLock<String>,
    debounced: Debouncer<String>,
    category: RwLock<CategoryFilter>,
    cache: Cache<CacheKey, Arc<Vec<Product>>>,
    cached_version: AtomicU64,
}

impl SearchEngine {
    /// Create an engine with an empty term and no category selected.
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            raw_term: RwLock::new(String::new()),
            debounced: Debouncer::new(String::new(), debounce),
            category: RwLock::new(CategoryFilter::All),
            cache: Cache::new(CACHE_CAPACITY),
            cached_version: AtomicU64::new(0),
        }
    }

    /// Record a keystroke. The visible list follows after the quiet period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn set_term(&self, term: impl Into<String>) {
        let term = term.into();
        (*self.raw_term.write().unwrap_or_else(PoisonError::into_inner)).clone_from(&term);
        self.debounced.push(term);
    }

    /// Clear the term immediately, without waiting for the quiet period.
    pub fn clear_term(&self) {
        self.raw_term
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.debounced.flush(String::new());
    }

    /// Select a category. Takes effect immediately.
    pub fn set_category(&self, category: CategoryFilter) {
        *self.category.write().unwrap_or_else(PoisonError::into_inner) = category;
    }

    /// Current inputs.
    #[must_use]
    pub fn filter_state(&self) -> FilterState {
        FilterState {
            raw_term: self
                .raw_term
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            debounced_term: self.debounced.current(),
            category: self.category(),
        }
    }

    /// Selected category.
    #[must_use]
    pub fn category(&self) -> CategoryFilter {
        self.category
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver notified whenever the debounced term changes.
    #[must_use]
    pub fn watch_term(&self) -> watch::Receiver<String> {
        self.debounced.subscribe()
    }

    /// Visible list for the current debounced term and category.
    #[must_use]
    pub fn visible(&self, catalog: &LiveState<Product>) -> Arc<Vec<Product>> {
        let term = self.debounced.current();
        let category = self.category();
        self.query(catalog, &term, &category, false)
    }

    /// Products of `catalog` matching `term` in `category`, optionally in stock only.
    #[must_use]
    pub fn query(
        &self,
        catalog: &LiveState<Product>,
        term: &str,
        category: &CategoryFilter,
        available: bool,
    ) -> Arc<Vec<Product>> {
        self.invalidate_if_stale(catalog.version);

        let key = CacheKey {
            version: catalog.version,
            term: filter::normalize_term(term),
            category: category.clone(),
            available,
        };
        self.cache.get_with(key, || {
            let found = filter::search(&catalog.items, term, category);
            let found = if available {
                filter::available_only(found)
            } else {
                found
            };
            Arc::new(found)
        })
    }

    /// Number of memoized result lists.
    #[must_use]
    pub fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn invalidate_if_stale(&self, version: u64) {
        let previous = self.cached_version.swap(version, Ordering::AcqRel);
        if previous != version {
            debug!(previous, version, "Catalog changed, dropping search cache");
            self.cache.invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use corner_shop_core::Price;
    use pretty_assertions::assert_eq;

    use super::*;

    fn catalog(version: u64, products: Vec<Product>) -> LiveState<Product> {
        LiveState {
            items: Arc::new(products),
            loading: false,
            version,
            ..LiveState::default()
        }
    }

    fn products() -> Vec<Product> {
        vec![
            Product::new("1", "Chai", Price::from_cents(450)).with_category("drinks"),
            Product::new("2", "Churro", Price::from_cents(200))
                .with_category("sweets")
                .with_stock(false),
            Product::new("3", "Brownie", Price::from_cents(350)).with_category("sweets"),
        ]
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|product| product.id.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_follows_debounced_term() {
        let engine = SearchEngine::new(Duration::from_millis(300));
        let state = catalog(1, products());

        engine.set_term("c");
        engine.set_term("ch");
        assert_eq!(engine.filter_state().raw_term, "ch");
        assert_eq!(engine.visible(&state).len(), 3);

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(engine.filter_state().debounced_term, "ch");
        assert_eq!(ids(&engine.visible(&state)), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_term_is_immediate() {
        let engine = SearchEngine::new(Duration::from_millis(300));
        let state = catalog(1, products());
        engine.set_term("brownie");
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(engine.visible(&state).len(), 1);

        engine.clear_term();
        assert_eq!(engine.filter_state().raw_term, "");
        assert_eq!(engine.visible(&state).len(), 3);
    }

    #[test]
    fn test_category_and_availability() {
        let engine = SearchEngine::new(Duration::from_millis(300));
        let state = catalog(1, products());
        engine.set_category(CategoryFilter::parse("sweets"));

        assert_eq!(ids(&engine.visible(&state)), vec!["2", "3"]);
        let sweets = CategoryFilter::parse("sweets");
        assert_eq!(ids(&engine.query(&state, "", &sweets, true)), vec!["3"]);
    }

    #[test]
    fn test_cache_reuses_results_until_version_changes() {
        let engine = SearchEngine::new(Duration::from_millis(300));
        let first = catalog(1, products());

        let a = engine.query(&first, " CH ", &CategoryFilter::All, false);
        let b = engine.query(&first, "ch", &CategoryFilter::All, false);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.cached_entries(), 1);

        let second = catalog(2, vec![Product::new("9", "Chocolate", Price::from_cents(100))]);
        let c = engine.query(&second, "ch", &CategoryFilter::All, false);
        assert_eq!(ids(&c), vec!["9"]);
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
