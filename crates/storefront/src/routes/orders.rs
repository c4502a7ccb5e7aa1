//! Order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use corner_shop_core::{Order, OrderId, OrderStatus, StatusFilter};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query parameters for the order listing.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    /// `all` or one status wire name.
    pub status: Option<String>,
}

/// Status change request.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// Recent orders, newest first.
///
/// GET /api/orders
///
/// # Errors
///
/// Returns 400 for an unknown status filter.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>> {
    let filter = match query.status.as_deref() {
        Some(raw) => raw.parse::<StatusFilter>().map_err(AppError::BadRequest)?,
        None => StatusFilter::All,
    };
    Ok(Json(state.orders().filtered(filter)))
}

/// Move an order to a new status.
///
/// PUT /api/orders/{id}/status
///
/// # Errors
///
/// Returns 404 for an unknown order, 409 for a forbidden transition and 502
/// if the remote write fails.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<StatusCode> {
    state
        .orders()
        .set_status(&OrderId::new(id), update.status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an order.
///
/// DELETE /api/orders/{id}
///
/// # Errors
///
/// Returns 404 for an unknown order and 502 if the remote write fails.
pub async fn destroy(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.orders().delete_order(&OrderId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use crate::remote::{Record, to_fields};
    use crate::routes::test_support::TestApp;

    fn order(id: &str, status: &str, created_at: &str) -> Record {
        Record::new(
            id,
            to_fields(&json!({ "total": 12.5, "status": status, "createdAt": created_at }))
                .unwrap(),
        )
    }

    async fn app() -> TestApp {
        TestApp::new(
            Vec::new(),
            vec![
                order("o1", "pending", "2026-05-01T09:00:00Z"),
                order("o2", "delivered", "2026-05-01T10:00:00Z"),
                order("o3", "pending", "2026-05-01T11:00:00Z"),
            ],
        )
        .await
    }

    fn ids(body: &serde_json::Value) -> Vec<&str> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|o| o["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_index_newest_first_with_filter() {
        let app = app().await;
        let (_, body) = app.call("GET", "/api/orders", None).await;
        assert_eq!(ids(&body), vec!["o3", "o2", "o1"]);

        let (_, body) = app.call("GET", "/api/orders?status=pending", None).await;
        assert_eq!(ids(&body), vec!["o3", "o1"]);

        let (status, _) = app.call("GET", "/api/orders?status=lost", None).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let app = app().await;
        let (status, _) = app
            .call("PUT", "/api/orders/o1/status", Some(json!({ "status": "ready" })))
            .await;
        assert_eq!(status, 204);

        let (status, _) = app
            .call("PUT", "/api/orders/o2/status", Some(json!({ "status": "pending" })))
            .await;
        assert_eq!(status, 409);

        let (status, _) = app
            .call("PUT", "/api/orders/nope/status", Some(json!({ "status": "ready" })))
            .await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_delete() {
        let app = app().await;
        let (status, _) = app.call("DELETE", "/api/orders/o2", None).await;
        assert_eq!(status, 204);
        assert_eq!(app.orders.documents().len(), 2);
    }
}
