//! Client-side product filtering.
//!
//! Substring matching only: no tokenization, no ranking. Every function
//! preserves the catalog order.

use corner_shop_core::{CategoryFilter, Product};

/// Products in `category`, or every product for [`CategoryFilter::All`].
#[must_use]
pub fn filter_by_category(products: &[Product], category: &CategoryFilter) -> Vec<Product> {
    products
        .iter()
        .filter(|product| category.matches(&product.category))
        .cloned()
        .collect()
}

/// Normalize a search term: trimmed and lowercased.
#[must_use]
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Whether `product` matches an already-normalized, non-empty `needle`.
///
/// Name, description and ingredients are each searched case-insensitively.
#[must_use]
pub fn matches_term(product: &Product, needle: &str) -> bool {
    [&product.name, &product.description, &product.ingredients]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Products in `category` matching `term`.
///
/// A blank term is no filter at all: the result is the category view.
#[must_use]
pub fn search(products: &[Product], term: &str, category: &CategoryFilter) -> Vec<Product> {
    let needle = normalize_term(term);
    if needle.is_empty() {
        return filter_by_category(products, category);
    }
    products
        .iter()
        .filter(|product| category.matches(&product.category) && matches_term(product, &needle))
        .cloned()
        .collect()
}

/// Drop products that are out of stock.
#[must_use]
pub fn available_only(products: Vec<Product>) -> Vec<Product> {
    products.into_iter().filter(|product| product.stock).collect()
}
