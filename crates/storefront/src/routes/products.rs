//! Catalog and search route handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use corner_shop_core::{CategoryFilter, Product, ProductId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::catalog::{FilterState, ProductDraft, ProductPatch};
use crate::error::Result;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Search term; the live debounced term when absent.
    pub q: Option<String>,
    /// Category; the live selected category when absent.
    pub category: Option<String>,
    /// Only products in stock.
    #[serde(default)]
    pub available: bool,
}

/// Product listing with the state of the catalog behind it.
#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Arc<Vec<Product>>,
    pub loading: bool,
    pub error: Option<String>,
    /// Served from the offline mirror.
    pub offline: bool,
}

/// Live search update.
#[derive(Debug, Deserialize)]
pub struct SearchUpdate {
    pub term: Option<String>,
    pub category: Option<String>,
}

/// Availability update.
#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub stock: bool,
}

/// Visible products.
///
/// GET /api/products
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Json<ProductList> {
    let catalog = state.catalog().state();
    let search = state.search();

    let term = query
        .q
        .unwrap_or_else(|| search.filter_state().debounced_term);
    let category = query
        .category
        .map_or_else(|| search.category(), |c| CategoryFilter::parse(&c));
    let products = search.query(&catalog, &term, &category, query.available);

    Json(ProductList {
        products,
        loading: catalog.loading,
        error: catalog.error.clone(),
        offline: catalog.from_mirror,
    })
}

/// Distinct categories in first-seen order.
///
/// GET /api/categories
pub async fn categories(State(state): State<AppState>) -> Json<Arc<Vec<String>>> {
    Json(state.catalog().categories())
}

/// Update the live search inputs. The term takes effect after the debounce.
///
/// PUT /api/search
pub async fn search(
    State(state): State<AppState>,
    Json(update): Json<SearchUpdate>,
) -> Json<FilterState> {
    let search = state.search();
    match update.term {
        Some(term) if !term.trim().is_empty() => search.set_term(term),
        Some(_) => search.clear_term(),
        None => {}
    }
    if let Some(category) = update.category {
        search.set_category(CategoryFilter::parse(&category));
    }
    Json(search.filter_state())
}

/// Create a product.
///
/// POST /api/products
///
/// # Errors
///
/// Returns 400 for an invalid draft and 502 if the remote write fails.
pub async fn create(
    State(state): State<AppState>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = state.catalog().add_product(draft).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Update a product.
///
/// PATCH /api/products/{id}
///
/// # Errors
///
/// Returns 400 for an empty patch, 404 for an unknown product and 502 if
/// the remote write fails.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> Result<StatusCode> {
    state
        .catalog()
        .update_product(&ProductId::new(id), patch)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set availability.
///
/// PUT /api/products/{id}/stock
///
/// # Errors
///
/// Returns 404 for an unknown product and 502 if the remote write fails.
pub async fn set_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StockUpdate>,
) -> Result<StatusCode> {
    state
        .catalog()
        .set_stock(&ProductId::new(id), update.stock)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a product.
///
/// DELETE /api/products/{id}
///
/// # Errors
///
/// Returns 404 for an unknown product and 502 if the remote write fails.
pub async fn destroy(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.catalog().delete_product(&ProductId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use crate::remote::{Record, to_fields};
    use crate::routes::test_support::TestApp;

    fn product(id: &str, name: &str, category: &str, stock: bool) -> Record {
        Record::new(
            id,
            to_fields(&json!({
                "name": name,
                "price": 4.5,
                "category": category,
                "stock": stock
            }))
            .unwrap(),
        )
    }

    async fn app() -> TestApp {
        TestApp::new(
            vec![
                product("1", "Chai", "drinks", true),
                product("2", "Churro", "sweets", false),
                product("3", "Brownie", "sweets", true),
            ],
            Vec::new(),
        )
        .await
    }

    fn names(body: &serde_json::Value) -> Vec<&str> {
        body["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_index_lists_in_catalog_order() {
        let app = app().await;
        let (status, body) = app.call("GET", "/api/products", None).await;
        assert_eq!(status, 200);
        // Products are ordered by name, descending.
        assert_eq!(names(&body), vec!["Churro", "Chai", "Brownie"]);
        assert_eq!(body["loading"], false);
        assert_eq!(body["offline"], false);
    }

    #[tokio::test]
    async fn test_index_filters() {
        let app = app().await;
        let (_, body) = app.call("GET", "/api/products?q=CH", None).await;
        assert_eq!(names(&body), vec!["Churro", "Chai"]);

        let (_, body) = app
            .call("GET", "/api/products?category=sweets&available=true", None)
            .await;
        assert_eq!(names(&body), vec!["Brownie"]);

        let (_, body) = app.call("GET", "/api/products?category=all", None).await;
        assert_eq!(names(&body).len(), 3);
    }

    #[tokio::test]
    async fn test_categories() {
        let app = app().await;
        let (_, body) = app.call("GET", "/api/categories", None).await;
        assert_eq!(body, json!(["sweets", "drinks"]));
    }

    #[tokio::test]
    async fn test_search_sets_category_immediately() {
        let app = app().await;
        let (status, body) = app
            .call(
                "PUT",
                "/api/search",
                Some(json!({ "term": "bro", "category": "sweets" })),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["raw_term"], "bro");
        assert_eq!(body["category"], "sweets");

        // Term still debouncing, category already applied.
        let (_, body) = app.call("GET", "/api/products", None).await;
        assert_eq!(names(&body), vec!["Churro", "Brownie"]);
    }

    #[tokio::test]
    async fn test_create_writes_through() {
        let app = app().await;
        let (status, body) = app
            .call(
                "POST",
                "/api/products",
                Some(json!({ "name": "Lassi", "price": 5, "category": "drinks" })),
            )
            .await;
        assert_eq!(status, 201);
        assert!(body["id"].is_string());
        assert_eq!(app.products.documents().len(), 4);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let app = app().await;
        let (status, _) = app
            .call("POST", "/api/products", Some(json!({ "name": " ", "price": 5 })))
            .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_stock_and_delete() {
        let app = app().await;
        let (status, _) = app
            .call("PUT", "/api/products/2/stock", Some(json!({ "stock": true })))
            .await;
        assert_eq!(status, 204);

        let (status, _) = app.call("DELETE", "/api/products/3", None).await;
        assert_eq!(status, 204);
        let (status, _) = app.call("DELETE", "/api/products/3", None).await;
        assert_eq!(status, 404);
        assert_eq!(app.products.documents().len(), 2);
    }
}
