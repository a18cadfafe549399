use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, Entry};
use nanoid::nanoid;
use rocket::{
    futures::{SinkExt, future::join_all, stream::SplitSink},
    http::Status,
};
use rocket_ws::{Message, stream::DuplexStream};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use sweeper_common::{
    document::{DocumentError, apply_update, check_precondition},
    protocol::{DocumentKey, ServerMessage, Snapshot, UpdateRequest},
};

pub type Documents = Arc<DashMap<DocumentKey, Arc<Mutex<Slot>>>>;

type Stream = SplitSink<DuplexStream, Message>;

#[derive(Error, Debug, PartialEq)]
pub enum WriteError {
    #[error("document not found")]
    NotFound,
    #[error("document already exists")]
    AlreadyExists,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error(transparent)]
    Rejected(#[from] DocumentError),
}

impl WriteError {
    pub fn status(&self) -> Status {
        match self {
            WriteError::NotFound => Status::NotFound,
            WriteError::AlreadyExists => Status::Conflict,
            WriteError::PreconditionFailed => Status::PreconditionFailed,
            WriteError::Rejected(_) => Status::UnprocessableEntity,
        }
    }
}

/// One stored document together with the streams watching it.
pub struct Slot {
    document: Option<Value>,
    version: u64,
    streams: HashMap<Uuid, Stream>,
    last_activity: Instant,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            document: None,
            version: 0,
            streams: HashMap::new(),
            last_activity: Instant::now(),
        }
    }
}

async fn send(stream: &mut Stream, message: &ServerMessage) {
    if let Ok(text) = serde_json::to_string(message) {
        let _ = stream.send(Message::Text(text)).await;
    }
}

async fn broadcast(streams: &mut HashMap<Uuid, Stream>, message: &ServerMessage) {
    let futures: Vec<_> = streams
        .iter_mut()
        .map(|(_, stream)| send(stream, message))
        .collect();

    join_all(futures).await;
}

fn require_object(document: &Value) -> Result<(), WriteError> {
    if document.is_object() {
        Ok(())
    } else {
        Err(DocumentError::NotAnObject.into())
    }
}

impl Slot {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            document: self.document.clone(),
        }
    }

    /// Stores `document` as the next version and pushes it to every stream.
    /// Callers hold the slot lock, so streams see versions in order.
    async fn commit(&mut self, document: Value) -> u64 {
        self.document = Some(document);
        self.version += 1;
        self.last_activity = Instant::now();
        let message = ServerMessage::from(self.snapshot());
        broadcast(&mut self.streams, &message).await;
        self.version
    }

    #[instrument(level = "trace", skip_all)]
    pub async fn set(&mut self, document: Value) -> Result<u64, WriteError> {
        require_object(&document)?;
        Ok(self.commit(document).await)
    }

    #[instrument(level = "trace", skip_all)]
    pub async fn create(&mut self, document: Value) -> Result<u64, WriteError> {
        require_object(&document)?;
        if self.document.is_some() {
            debug!("Refusing to overwrite existing document");
            return Err(WriteError::AlreadyExists);
        }
        Ok(self.commit(document).await)
    }

    #[instrument(level = "trace", skip_all, fields(fields = request.fields.len()))]
    pub async fn update(&mut self, request: UpdateRequest) -> Result<u64, WriteError> {
        let Some(current) = self.document.as_ref() else {
            return Err(WriteError::NotFound);
        };
        if let Some(precondition) = &request.precondition
            && !check_precondition(Some(current), precondition)
        {
            debug!("Precondition {:?} does not hold", precondition);
            return Err(WriteError::PreconditionFailed);
        }

        let mut updated = current.clone();
        apply_update(&mut updated, &request.fields)?;
        Ok(self.commit(updated).await)
    }

    /// Registers a stream and sends it the current snapshot.
    #[instrument(level = "trace", skip_all)]
    pub async fn add_stream(&mut self, mut stream: Stream) -> Uuid {
        let id = Uuid::new_v4();
        debug!("Adding stream {} to document", id);
        send(&mut stream, &ServerMessage::from(self.snapshot())).await;
        self.streams.insert(id, stream);
        self.last_activity = Instant::now();
        info!(
            "Stream {} added, total subscribers: {}",
            id,
            self.streams.len()
        );
        id
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn remove_stream(&mut self, id: &Uuid) {
        if self.streams.remove(id).is_some() {
            info!(
                "Stream {} removed, remaining subscribers: {}",
                id,
                self.streams.len()
            );
        } else {
            warn!("Attempted to remove non-existent stream: {}", id);
        }
        self.last_activity = Instant::now()
    }

    pub fn has_active_connections(&self) -> bool {
        !self.streams.is_empty()
    }

    pub fn should_cleanup(&self, inactive_timeout: Duration) -> bool {
        if self.has_active_connections() {
            return false;
        }

        self.last_activity.elapsed() >= inactive_timeout
    }
}

/// Slot for `key`, if the document has ever been touched.
pub fn slot(documents: &Documents, key: &DocumentKey) -> Option<Arc<Mutex<Slot>>> {
    documents.get(key).map(|slot| slot.value().clone())
}

/// Slot for `key`, creating an empty one when missing.
pub fn slot_or_default(documents: &Documents, key: &DocumentKey) -> Arc<Mutex<Slot>> {
    documents.entry(key.clone()).or_default().value().clone()
}

/// Reserves an unused id in `collection` by inserting an empty slot for it.
/// Ids start at five characters and grow when a length keeps colliding.
#[instrument(level = "trace", skip(documents))]
pub fn allocate_id(documents: &Documents, collection: &str) -> String {
    let mut id_length = 5;
    let max_attempts_per_length = 10;

    loop {
        for _ in 0..max_attempts_per_length {
            let id = nanoid!(id_length);
            match documents.entry(DocumentKey::new(collection, id.clone())) {
                Entry::Occupied(_) => {
                    debug!("Document ID collision, trying another: {}", id);
                    continue;
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::default());
                    info!("Reserved document ID {}/{}", collection, id);
                    return id;
                }
            }
        }

        warn!(
            "Exhausted ID attempts at length {}, increasing to {}",
            id_length,
            id_length + 1
        );
        id_length += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;
    use sweeper_common::protocol::Precondition;

    use super::*;

    fn fields<const N: usize>(entries: [(&str, Value); N]) -> BTreeMap<String, Value> {
        entries
            .into_iter()
            .map(|(path, value)| (path.to_string(), value))
            .collect()
    }

    fn turn_update(from: &str, to: &str) -> UpdateRequest {
        UpdateRequest {
            fields: fields([("playerTurn", json!(to))]),
            precondition: Some(Precondition::FieldEquals {
                path: "playerTurn".to_string(),
                value: json!(from),
            }),
        }
    }

    #[tokio::test]
    async fn versions_count_accepted_writes() {
        let mut slot = Slot::default();
        assert_eq!(slot.snapshot().version, 0);

        assert_eq!(slot.set(json!({ "playerTurn": "alice" })).await, Ok(1));
        assert_eq!(slot.update(turn_update("alice", "bob")).await, Ok(2));
        assert_eq!(
            slot.update(turn_update("alice", "bob")).await,
            Err(WriteError::PreconditionFailed)
        );

        let snapshot = slot.snapshot();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.document, Some(json!({ "playerTurn": "bob" })));
    }

    #[tokio::test]
    async fn create_refuses_existing_documents() {
        let mut slot = Slot::default();

        assert_eq!(slot.create(json!({ "owner": "alice" })).await, Ok(1));
        assert_eq!(
            slot.create(json!({ "owner": "bob" })).await,
            Err(WriteError::AlreadyExists)
        );
        assert_eq!(slot.snapshot().document, Some(json!({ "owner": "alice" })));
    }

    #[tokio::test]
    async fn update_needs_a_document() {
        let mut slot = Slot::default();

        let result = slot
            .update(UpdateRequest {
                fields: fields([("status", json!("WON"))]),
                precondition: None,
            })
            .await;

        assert_eq!(result, Err(WriteError::NotFound));
        assert_eq!(slot.snapshot().version, 0);
    }

    #[tokio::test]
    async fn invalid_writes_are_rejected_whole() {
        let mut slot = Slot::default();
        let error = slot.set(json!("not an object")).await.unwrap_err();
        assert_eq!(error.status(), Status::UnprocessableEntity);

        slot.set(json!({ "status": "ACTIVE", "board": {} })).await.unwrap();
        let result = slot
            .update(UpdateRequest {
                fields: fields([
                    ("board.0_0.revealed", json!(true)),
                    ("status.nested", json!(1)),
                ]),
                precondition: None,
            })
            .await;

        assert!(matches!(result, Err(WriteError::Rejected(_))));
        assert_eq!(
            slot.snapshot().document,
            Some(json!({ "status": "ACTIVE", "board": {} }))
        );
    }

    #[test]
    fn idle_slots_without_streams_are_evicted() {
        let slot = Slot::default();

        assert!(slot.should_cleanup(Duration::ZERO));
        assert!(!slot.should_cleanup(Duration::from_secs(3600)));
    }

    #[test]
    fn allocated_ids_are_reserved() {
        let documents = Documents::default();

        let first = allocate_id(&documents, "games");
        let second = allocate_id(&documents, "games");

        assert_eq!(first.len(), 5);
        assert_ne!(first, second);
        assert!(slot(&documents, &DocumentKey::new("games", first)).is_some());
        assert!(slot(&documents, &DocumentKey::new("other", second)).is_none());
    }
}
