//! Shopper notification stream.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::notify::Notification;
use crate::state::AppState;

/// Stream cart and checkout notifications as server-sent events.
///
/// GET /api/notifications
///
/// Each event carries one notification as JSON. A listener that falls
/// behind skips the messages it missed.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before responding so nothing sent after the headers is lost.
    let mut rx = state.notifier().subscribe();

    let notifications = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(notification) => yield notification,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    let events = notifications.map(|notification: Notification| {
        let json = serde_json::to_string(&notification).unwrap_or_else(|_| {
            r#"{"level":"error","message":"Failed to serialize notification"}"#.to_string()
        });
        Ok(Event::default().data(json))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use corner_shop_core::{Price, Product};
    use futures::StreamExt;
    use serde_json::Value;

    use crate::remote::Record;
    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_cart_changes_reach_the_stream() {
        let product = Product::new("p1", "Alfajor", Price::from_cents(150));
        let app = TestApp::new(vec![Record::from_item(&product).unwrap()], Vec::new()).await;

        let response = app
            .send(
                Request::builder()
                    .uri("/api/notifications")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let (status, _) = app.call("DELETE", "/api/cart/lines/p1", None).await;
        assert_eq!(status, 404);

        let mut body = response.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        let data = text
            .lines()
            .find_map(|line| line.strip_prefix("data:"))
            .unwrap();
        let notification: Value = serde_json::from_str(data.trim()).unwrap();
        assert_eq!(notification["level"], "warning");
        assert_eq!(notification["message"], "That item is not in your cart");
    }
}
