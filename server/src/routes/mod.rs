use rocket::{
    State, futures::StreamExt, get, http::Status, patch, post, put, serde::json::Json,
};
use rocket_ws::{Channel, Message, WebSocket};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use sweeper_common::protocol::{DocumentKey, IdResponse, Snapshot, UpdateRequest, WriteResponse};

use crate::{
    config::StoreConfig,
    documents::{Documents, WriteError, allocate_id, slot, slot_or_default},
    rate_limit::{ClientIp, RateLimiter, check_rate_limit},
};

fn written(
    key: &DocumentKey,
    result: Result<u64, WriteError>,
) -> Result<Json<WriteResponse>, Status> {
    match result {
        Ok(version) => {
            debug!("Wrote {} at version {}", key, version);
            Ok(Json(WriteResponse { version }))
        }
        Err(e) => {
            debug!("Write to {} refused: {}", key, e);
            Err(e.status())
        }
    }
}

#[get("/documents/<collection>/<id>")]
#[instrument(level = "trace", skip(documents))]
pub async fn get_document(
    collection: &str,
    id: &str,
    documents: &State<Documents>,
) -> Json<Snapshot> {
    let key = DocumentKey::new(collection, id);
    let snapshot = match slot(documents, &key) {
        Some(slot) => slot.lock().await.snapshot(),
        None => Snapshot {
            version: 0,
            document: None,
        },
    };
    Json(snapshot)
}

#[put("/documents/<collection>/<id>", data = "<document>")]
#[instrument(level = "trace", skip(document, documents, rate_limiter, config), fields(client_ip = %client_ip.0))]
pub async fn set_document(
    collection: &str,
    id: &str,
    document: Json<Value>,
    documents: &State<Documents>,
    rate_limiter: &State<RateLimiter>,
    config: &State<StoreConfig>,
    client_ip: ClientIp,
) -> Result<Json<WriteResponse>, Status> {
    check_rate_limit(rate_limiter, config, &client_ip)?;

    let key = DocumentKey::new(collection, id);
    let slot = slot_or_default(documents, &key);
    let result = slot.lock().await.set(document.into_inner()).await;
    written(&key, result)
}

#[post("/documents/<collection>/<id>", data = "<document>")]
#[instrument(level = "trace", skip(document, documents, rate_limiter, config), fields(client_ip = %client_ip.0))]
pub async fn create_document(
    collection: &str,
    id: &str,
    document: Json<Value>,
    documents: &State<Documents>,
    rate_limiter: &State<RateLimiter>,
    config: &State<StoreConfig>,
    client_ip: ClientIp,
) -> Result<(Status, Json<WriteResponse>), Status> {
    check_rate_limit(rate_limiter, config, &client_ip)?;

    let key = DocumentKey::new(collection, id);
    let slot = slot_or_default(documents, &key);
    let result = slot.lock().await.create(document.into_inner()).await;
    let response = written(&key, result)?;
    info!("Created document {} for client {}", key, client_ip.0);
    Ok((Status::Created, response))
}

#[patch("/documents/<collection>/<id>", data = "<request>")]
#[instrument(level = "trace", skip(request, documents, rate_limiter, config), fields(client_ip = %client_ip.0))]
pub async fn update_document(
    collection: &str,
    id: &str,
    request: Json<UpdateRequest>,
    documents: &State<Documents>,
    rate_limiter: &State<RateLimiter>,
    config: &State<StoreConfig>,
    client_ip: ClientIp,
) -> Result<Json<WriteResponse>, Status> {
    check_rate_limit(rate_limiter, config, &client_ip)?;

    let key = DocumentKey::new(collection, id);
    let Some(slot) = slot(documents, &key) else {
        debug!("Update for unknown document {}", key);
        return Err(Status::NotFound);
    };
    let result = slot.lock().await.update(request.into_inner()).await;
    written(&key, result)
}

#[post("/ids/<collection>")]
#[instrument(level = "trace", skip(documents, rate_limiter, config), fields(client_ip = %client_ip.0))]
pub fn create_id(
    collection: &str,
    documents: &State<Documents>,
    rate_limiter: &State<RateLimiter>,
    config: &State<StoreConfig>,
    client_ip: ClientIp,
) -> Result<Json<IdResponse>, Status> {
    check_rate_limit(rate_limiter, config, &client_ip)?;

    let id = allocate_id(documents, collection);
    info!("Allocated id {} in {} for client {}", id, collection, client_ip.0);
    Ok(Json(IdResponse { id }))
}

#[get("/subscribe?<collection>&<id>")]
#[instrument(level = "trace", skip(ws, documents))]
pub fn subscribe(
    ws: WebSocket,
    documents: &State<Documents>,
    collection: String,
    id: String,
) -> Channel<'static> {
    let key = DocumentKey::new(collection, id);
    let slot = slot_or_default(documents, &key);
    info!("WebSocket subscription opened for {}", key);

    ws.channel(move |stream| {
        Box::pin(async move {
            let (write, mut read) = stream.split();

            let stream_id = {
                let mut slot = slot.lock().await;
                slot.add_stream(write).await
            };

            info!("Client subscribed to {} (stream: {})", key, stream_id);

            // Subscribers only listen, so client frames other than close are ignored.
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Close(_)) => {
                        info!(
                            "WebSocket connection closed for {} (stream: {})",
                            key, stream_id
                        );
                        break;
                    }
                    Ok(message) => {
                        debug!("Ignoring client frame on {}: {:?}", key, message);
                    }
                    Err(e) => {
                        error!("WebSocket error on {} (stream: {}): {}", key, stream_id, e);
                        break;
                    }
                }
            }

            {
                let mut slot = slot.lock().await;
                slot.remove_stream(&stream_id).await;
            }

            info!("Client unsubscribed from {} (stream: {})", key, stream_id);
            Ok(())
        })
    })
}
