//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cart::CartError;
use crate::live::StoreError;
use crate::remote::RemoteError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Catalog or order store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) | Self::Cart(CartError::Order(err)) => store_status(err),
            Self::Cart(CartError::EmptyCart) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Cart(CartError::LineNotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(CartError::CheckoutInProgress) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) | StoreError::Remote(RemoteError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
        StoreError::Remote(RemoteError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
        StoreError::Remote(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::BAD_GATEWAY => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use corner_shop_core::{OrderStatus, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(CartError::EmptyCart.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(CartError::LineNotFound(ProductId::new("p1")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::CheckoutInProgress.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                StoreError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(StoreError::Remote(RemoteError::Unavailable("down".to_string())).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(CartError::Order(StoreError::Remote(RemoteError::RateLimited(3))).into()),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
