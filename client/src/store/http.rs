use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use sweeper_common::protocol::{DocumentKey, IdResponse, Snapshot, UpdateRequest, WriteResponse};
use tracing::{debug, instrument};
use url::Url;

use super::{RemoteStore, Subscription, websocket};
use crate::error::StoreError;

/// Client for the sweeper document store service.
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
}

impl HttpStore {
    /// Create a store client for the service at `base_url`
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)?;
        let client = Client::new();

        Ok(Self { client, base_url })
    }

    /// `base_url` extended by `segments`, each percent-encoded as one path
    /// segment. Any path prefix on the base is kept.
    fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn document_url(&self, key: &DocumentKey) -> Result<Url, StoreError> {
        self.endpoint(["documents", key.collection.as_str(), key.id.as_str()])
    }

    /// WebSocket URL streaming snapshots of `key`
    pub fn subscribe_url(&self, key: &DocumentKey) -> Result<Url, StoreError> {
        let mut url = self.endpoint(["subscribe"])?;
        url.set_scheme(match self.base_url.scheme() {
            "https" => "wss",
            _ => "ws",
        })
        .map_err(|_| StoreError::Unavailable("failed to set websocket scheme".to_string()))?;
        url.query_pairs_mut()
            .clear()
            .append_pair("collection", &key.collection)
            .append_pair("id", &key.id);
        Ok(url)
    }

    /// Reserve a fresh, unused document id in `collection`.
    /// Share it with the other player to start an online game.
    pub async fn allocate_id(&self, collection: &str) -> Result<String, StoreError> {
        let url = self.endpoint(["ids", collection])?;
        let response = send(self.client.post(url)).await?;
        let IdResponse { id } = response.json().await?;
        debug!("Allocated id {} in {}", id, collection);
        Ok(id)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request.send().await?;
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound),
        StatusCode::CONFLICT => Err(StoreError::AlreadyExists),
        StatusCode::PRECONDITION_FAILED => Err(StoreError::PreconditionFailed),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(StoreError::Rejected(response.status().to_string()))
        }
        status => Err(StoreError::Unavailable(format!("store responded {}", status))),
    }
}

async fn version(response: Response) -> Result<u64, StoreError> {
    let WriteResponse { version } = response.json().await?;
    Ok(version)
}

impl RemoteStore for HttpStore {
    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn get(&self, key: &DocumentKey) -> Result<Snapshot, StoreError> {
        let url = self.document_url(key)?;
        let response = send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn set(&self, key: &DocumentKey, document: Value) -> Result<u64, StoreError> {
        let url = self.document_url(key)?;
        version(send(self.client.put(url).json(&document)).await?).await
    }

    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn create(&self, key: &DocumentKey, document: Value) -> Result<u64, StoreError> {
        let url = self.document_url(key)?;
        version(send(self.client.post(url).json(&document)).await?).await
    }

    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn update(&self, key: &DocumentKey, request: UpdateRequest) -> Result<u64, StoreError> {
        let url = self.document_url(key)?;
        version(send(self.client.patch(url).json(&request)).await?).await
    }

    async fn subscribe(&self, key: &DocumentKey) -> Result<Subscription, StoreError> {
        let url = self.subscribe_url(key)?;
        websocket::subscribe(url.as_str()).await
    }
}
