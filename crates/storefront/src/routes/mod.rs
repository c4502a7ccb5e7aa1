//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                   - Liveness check
//! GET    /health/ready             - Catalog loaded and live
//!
//! # Catalog
//! GET    /api/products             - Visible products (?q, ?category, ?available)
//! POST   /api/products             - Create product
//! PATCH  /api/products/{id}        - Update product
//! DELETE /api/products/{id}        - Delete product
//! PUT    /api/products/{id}/stock  - Set availability
//! GET    /api/categories           - Distinct categories
//! PUT    /api/search               - Set live search term and category
//!
//! # Cart
//! GET    /api/cart                 - Lines, item count, total
//! POST   /api/cart/lines           - Add to cart
//! PATCH  /api/cart/lines/{id}      - Update quantity
//! DELETE /api/cart/lines/{id}      - Remove line
//! GET    /api/cart/quote           - Checkout quote (?points, ?balance)
//! POST   /api/cart/checkout        - Place order
//!
//! # Orders
//! GET    /api/orders               - Recent orders (?status)
//! PUT    /api/orders/{id}/status   - Change status
//! DELETE /api/orders/{id}          - Delete order
//!
//! # Notifications
//! GET    /api/notifications        - Server-sent notification stream
//! ```

pub mod cart;
pub mod notifications;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post, put},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            patch(products::update).delete(products::destroy),
        )
        .route("/{id}/stock", put(products::set_stock))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/lines", post(cart::add))
        .route("/lines/{id}", patch(cart::update).delete(cart::remove))
        .route("/quote", get(cart::quote))
        .route("/checkout", post(cart::checkout))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", axum::routing::delete(orders::destroy))
        .route("/{id}/status", put(orders::set_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/products", product_routes())
        .route("/api/categories", get(products::categories))
        .route("/api/search", put(products::search))
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .route("/api/notifications", get(notifications::stream))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable until the catalog has a live snapshot,
/// and while it is serving from the offline mirror.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.catalog().state().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::TestApp;

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new(Vec::new(), Vec::new()).await;
        let (status, body) = app.call("GET", "/health", None).await;
        assert_eq!(status, 200);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_readiness_follows_catalog() {
        let app = TestApp::new(Vec::new(), Vec::new()).await;
        assert_eq!(app.call("GET", "/health/ready", None).await.0, 200);

        app.state
            .catalog()
            .live()
            .apply_error(&crate::remote::RemoteError::Unavailable("offline".to_string()))
            .await;
        assert_eq!(app.call("GET", "/health/ready", None).await.0, 503);
    }
}
