//! Cart route handlers.
//!
//! One cart per running storefront. Products are resolved against the live
//! catalog snapshot, so a line always starts from the product as currently
//! listed.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use corner_shop_core::ProductId;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::cart::{CartSummary, CheckoutQuote};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Add-to-cart request.
#[derive(Debug, Deserialize)]
pub struct AddLine {
    pub product_id: String,
    #[serde(default = "one")]
    pub qty: u32,
}

const fn one() -> u32 {
    1
}

/// Quantity update. Values below one remove the line.
#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub qty: i64,
}

/// Quote parameters.
#[derive(Debug, Default, Deserialize)]
pub struct QuoteQuery {
    /// Points the shopper wants to redeem.
    #[serde(default)]
    pub points: u64,
    /// Points the shopper holds.
    #[serde(default)]
    pub balance: u64,
}

/// Current cart.
///
/// GET /api/cart
pub async fn show(State(state): State<AppState>) -> Json<CartSummary> {
    Json(state.cart().summary())
}

/// Add a product to the cart, replacing the quantity of an existing line.
///
/// POST /api/cart/lines
///
/// # Errors
///
/// Returns 404 for a product missing from the catalog and 400 for a
/// product out of stock.
pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<AddLine>,
) -> Result<Json<CartSummary>> {
    let id = ProductId::new(request.product_id);
    let product = state
        .catalog()
        .find(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    if !product.stock {
        return Err(AppError::BadRequest(format!("{} is out of stock", product.name)));
    }

    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id.as_str())]));
    state.cart().add_to_cart(&product, request.qty);
    Ok(Json(state.cart().summary()))
}

/// Change the quantity of a line.
///
/// PATCH /api/cart/lines/{id}
///
/// # Errors
///
/// Returns 404 if the product is not in the cart.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<QuantityUpdate>,
) -> Result<Json<CartSummary>> {
    state
        .cart()
        .update_quantity(&ProductId::new(id), update.qty)?;
    Ok(Json(state.cart().summary()))
}

/// Remove a line.
///
/// DELETE /api/cart/lines/{id}
///
/// # Errors
///
/// Returns 404 if the product is not in the cart.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CartSummary>> {
    if !state.cart().remove_from_cart(&ProductId::new(id.clone())) {
        return Err(AppError::NotFound(format!("cart line {id}")));
    }
    Ok(Json(state.cart().summary()))
}

/// Quote the cart with shipping and points.
///
/// GET /api/cart/quote
pub async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Json<CheckoutQuote> {
    Json(state.cart().quote(query.points, query.balance))
}

/// Place an order for the cart.
///
/// POST /api/cart/checkout
///
/// # Errors
///
/// Returns 422 for an empty cart and 502 if the order could not be created;
/// the cart is kept in both cases.
pub async fn checkout(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>)> {
    add_breadcrumb("cart", "Checkout", None);
    let id = state.cart().checkout(state.orders()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
