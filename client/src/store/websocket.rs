use futures_util::{SinkExt, StreamExt};
use sweeper_common::protocol::ServerMessage;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{Notification, Subscription};
use crate::error::StoreError;

/// Open a snapshot stream from the store service.
///
/// A listener task forwards every snapshot frame into the subscription.
/// Transport failures are forwarded once, then the listener stops.
pub(super) async fn subscribe(url: &str) -> Result<Subscription, StoreError> {
    info!("Connecting to WebSocket: {}", url);

    let (ws_stream, _) = connect_async(url).await?;
    info!("WebSocket connected successfully");

    let (mut writer, mut reader) = ws_stream.split();
    let (sender, receiver) = mpsc::unbounded_channel::<Notification>();

    let listener = tokio::spawn(async move {
        while let Some(message) = reader.next().await {
            let notification = match message {
                Ok(Message::Text(text)) => {
                    debug!("Received message: {}", text);
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => Ok(message.into()),
                        Err(e) => Err(StoreError::Malformed(e)),
                    }
                }
                Ok(Message::Ping(payload)) => {
                    let _ = writer.send(Message::Pong(payload)).await;
                    continue;
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed");
                    let _ = sender.send(Err(StoreError::Unavailable(
                        "subscription closed by store".to_string(),
                    )));
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("Error receiving WebSocket message: {}", e);
                    let _ = sender.send(Err(e.into()));
                    break;
                }
            };

            if sender.send(notification).is_err() {
                debug!("Subscriber dropped, stopping listener");
                break;
            }
        }

        let _ = writer.close().await;
    });

    Ok(Subscription::new(receiver, Some(listener)))
}
