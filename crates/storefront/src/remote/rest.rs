//! JSON document REST API client.
//!
//! # Wire format
//!
//! - `GET {base}/{collection}?orderBy={field}&direction={asc|desc}&limit={n}`
//!   returns an array of objects, each carrying a string `id` next to its fields
//! - `POST {base}/{collection}` with the fields returns `{"id": "..."}`
//! - `PATCH {base}/{collection}/{id}` merges the given fields
//! - `DELETE {base}/{collection}/{id}`
//!
//! Requests carry the API key as a bearer token and the project id in
//! `X-Project-Id` when one is configured.
//!
//! The API has no push channel, so subscriptions poll at a fixed interval
//! and emit a snapshot only when the result changed. Failed polls are emitted
//! as subscription errors and polling carries on.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    CollectionQuery, Fields, Record, RemoteCollection, RemoteError, SnapshotEvent, Subscription,
};
use crate::config::RemoteConfig;

/// Longest response excerpt kept in error messages.
const BODY_EXCERPT: usize = 200;

/// [`RemoteCollection`] backed by a JSON document REST API.
#[derive(Clone)]
pub struct RestCollection {
    client: reqwest::Client,
    name: String,
    collection_url: Url,
    api_key: SecretString,
    project_id: Option<String>,
    poll_interval: Duration,
}

#[derive(Deserialize)]
struct CreatedDocument {
    id: String,
}

impl RestCollection {
    /// Create a client for `collection` under the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidRecord`] if the collection name does not
    /// form a valid URL under the base.
    pub fn new(config: &RemoteConfig, collection: &str) -> Result<Self, RemoteError> {
        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let collection_url = base
            .join(collection)
            .map_err(|e| RemoteError::InvalidRecord(format!("bad collection name: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            name: collection.to_string(),
            collection_url,
            api_key: config.api_key.clone(),
            project_id: config.project_id.clone(),
            poll_interval: config.poll_interval,
        })
    }

    /// URL of the collection.
    #[must_use]
    pub const fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    /// URL of one document.
    #[must_use]
    pub fn document_url(&self, id: &str) -> Url {
        let mut url = self.collection_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    /// URL of a list query.
    #[must_use]
    pub fn query_url(&self, query: &CollectionQuery) -> Url {
        let mut url = self.collection_url.clone();
        url.query_pairs_mut()
            .append_pair("orderBy", &query.order_by)
            .append_pair("direction", query.direction.as_str())
            .append_pair("limit", &query.limit.to_string());
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .bearer_auth(self.api_key.expose_secret());
        match &self.project_id {
            Some(project) => builder.header("X-Project-Id", project),
            None => builder,
        }
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<String, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(excerpt(&body)));
        }

        if !status.is_success() {
            tracing::error!(
                collection = %self.name,
                status = %status,
                body = %excerpt(&body),
                "Remote collection returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        Ok(body)
    }

    /// Fetch the current result of `query`.
    #[instrument(skip(self), fields(collection = %self.name))]
    pub async fn fetch(&self, query: &CollectionQuery) -> Result<Vec<Record>, RemoteError> {
        let body = self
            .execute(self.request(reqwest::Method::GET, self.query_url(query)))
            .await?;
        parse_documents(&body)
    }
}

#[async_trait]
impl RemoteCollection for RestCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, query: &CollectionQuery) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();
        let query = query.clone();

        let handle = tokio::spawn(async move {
            let mut last: Option<Vec<Record>> = None;
            let mut ticker = tokio::time::interval(client.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let event = match client.fetch(&query).await {
                    Ok(records) if last.as_ref() == Some(&records) => continue,
                    Ok(records) => {
                        last = Some(records.clone());
                        SnapshotEvent::Snapshot(records)
                    }
                    Err(e) => {
                        warn!(collection = %client.name, error = %e, "Poll failed");
                        // The next good poll must be delivered to clear the error.
                        last = None;
                        SnapshotEvent::Error(e)
                    }
                };
                if tx.send(event).is_err() {
                    debug!(collection = %client.name, "Subscriber gone, stopping poller");
                    break;
                }
            }
        });

        Subscription::new(rx, Some(handle.abort_handle()))
    }

    #[instrument(skip(self, fields), fields(collection = %self.name))]
    async fn create(&self, fields: Fields) -> Result<String, RemoteError> {
        let body = self
            .execute(
                self.request(reqwest::Method::POST, self.collection_url.clone())
                    .json(&fields),
            )
            .await?;
        let created: CreatedDocument = serde_json::from_str(&body)?;
        Ok(created.id)
    }

    #[instrument(skip(self, fields), fields(collection = %self.name))]
    async fn update(&self, id: &str, fields: Fields) -> Result<(), RemoteError> {
        self.execute(
            self.request(reqwest::Method::PATCH, self.document_url(id))
                .json(&fields),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.name))]
    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.execute(self.request(reqwest::Method::DELETE, self.document_url(id)))
            .await?;
        Ok(())
    }
}

/// Parse a list response into records. Entries without a string id are skipped.
fn parse_documents(body: &str) -> Result<Vec<Record>, RemoteError> {
    let documents: Vec<Fields> = serde_json::from_str(body)?;
    Ok(documents
        .into_iter()
        .filter_map(|mut fields| match fields.remove("id") {
            Some(Value::String(id)) => Some(Record::new(id, fields)),
            _ => {
                warn!("Skipping document without a string id");
                None
            }
        })
        .collect())
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT).collect()
}
