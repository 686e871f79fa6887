//! Outline HTTP API client.
//!
//! Every endpoint is a POST of a JSON payload with bearer auth; successful
//! responses wrap their result in a `data` envelope.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::models::{Collection, RemoteDoc};
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::{DocUpdate, RemoteGateway};

const HTTP_TIMEOUT_SECS: u64 = 30;
const PAGE_LIMIT: usize = 100;

/// Gateway backed by an Outline instance's HTTP API.
#[derive(Clone)]
pub struct OutlineGateway {
    base_url: String,
    token: String,
    client: Client,
}

impl std::fmt::Debug for OutlineGateway {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("OutlineGateway")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl OutlineGateway {
    /// Creates a gateway for the given instance URL and API token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::Config("api_url must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::Config(
                "api_url must include http:// or https://".to_string(),
            ));
        }
        let token = normalize_text_option(Some(token.into()))
            .ok_or_else(|| Error::Config("api_token must not be empty".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::Transport(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    /// Returns the instance URL this gateway was configured with.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let response = self.send(endpoint, payload).await?;
        let envelope = response
            .json::<Envelope<T>>()
            .await
            .map_err(|error| Error::Transport(format!("{endpoint}: invalid payload: {error}")))?;
        Ok(envelope.data)
    }

    async fn post_unit(&self, endpoint: &str, payload: &serde_json::Value) -> Result<()> {
        self.send(endpoint, payload).await?;
        Ok(())
    }

    async fn send(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/api/{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|error| Error::Transport(format!("{endpoint}: {error}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "{endpoint} returned HTTP {status}: {}",
                compact_text(&body)
            )));
        }
        Ok(response)
    }
}

impl RemoteGateway for OutlineGateway {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let payload = json!({ "offset": 0, "limit": PAGE_LIMIT });
        let collections: Vec<CollectionPayload> =
            self.post("collections.list", &payload).await?;
        Ok(collections.into_iter().map(Collection::from).collect())
    }

    async fn list_documents(&self, collection_id: &str) -> Result<Vec<RemoteDoc>> {
        let mut docs = Vec::new();
        let mut offset = 0usize;

        loop {
            let payload = json!({
                "collectionId": collection_id,
                "offset": offset,
                "limit": PAGE_LIMIT,
            });
            let page: Vec<DocumentPayload> = self.post("documents.list", &payload).await?;
            let count = page.len();
            docs.extend(page.into_iter().map(RemoteDoc::from));

            if count < PAGE_LIMIT {
                break;
            }
            offset += count;
        }

        Ok(docs)
    }

    async fn create_document(
        &self,
        collection_id: &str,
        title: &str,
        text: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteDoc> {
        let payload = json!({
            "collectionId": collection_id,
            "title": title,
            "text": text,
            "parentDocumentId": parent_id,
            "publish": true,
        });
        let created: DocumentPayload = self.post("documents.create", &payload).await?;
        Ok(created.into())
    }

    async fn update_document(&self, id: &str, update: DocUpdate<'_>) -> Result<RemoteDoc> {
        let mut payload = serde_json::Map::new();
        payload.insert("id".to_string(), json!(id));
        if let Some(title) = update.title {
            payload.insert("title".to_string(), json!(title));
        }
        if let Some(text) = update.text {
            payload.insert("text".to_string(), json!(text));
        }
        if let Some(parent_id) = update.parent_id {
            payload.insert("parentDocumentId".to_string(), json!(parent_id));
        }
        let updated: DocumentPayload = self
            .post("documents.update", &serde_json::Value::Object(payload))
            .await?;
        Ok(updated.into())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        self.post_unit("documents.delete", &json!({ "id": id })).await
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionPayload {
    id: String,
    name: String,
}

impl From<CollectionPayload> for Collection {
    fn from(payload: CollectionPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentPayload {
    id: String,
    #[serde(default)]
    url_id: Option<String>,
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    parent_document_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentPayload> for RemoteDoc {
    fn from(payload: DocumentPayload) -> Self {
        Self {
            id: payload.id,
            short_id: payload.url_id.filter(|short_id| !short_id.is_empty()),
            title: payload.title,
            text: payload.text,
            parent_id: payload.parent_document_id,
            created_at: payload.created_at,
            updated_at: payload.updated_at,
        }
    }
}
