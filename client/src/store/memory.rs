use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use serde_json::Value;
use sweeper_common::{
    document::{apply_update, check_precondition},
    protocol::{DocumentKey, Snapshot, UpdateRequest},
};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use super::{Notification, RemoteStore, Subscription};
use crate::error::StoreError;

#[derive(Default)]
struct Slot {
    document: Option<Value>,
    version: u64,
    subscribers: Vec<mpsc::UnboundedSender<Notification>>,
}

impl Slot {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            document: self.document.clone(),
        }
    }

    fn commit(&mut self, document: Value) -> u64 {
        self.document = Some(document);
        self.version += 1;
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(Ok(snapshot.clone())).is_ok());
        self.version
    }
}

#[derive(Default)]
struct Inner {
    documents: DashMap<DocumentKey, Slot>,
    writes: AtomicUsize,
    offline: AtomicBool,
}

/// In-process store. Clones share the same documents, so two sessions can
/// play against each other on one machine.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with [`StoreError::Unavailable`]
    /// and live subscribers receive that error once.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
        if offline {
            for mut slot in self.inner.documents.iter_mut() {
                slot.subscribers.retain(|subscriber| {
                    subscriber
                        .send(Err(StoreError::Unavailable("store offline".to_string())))
                        .is_ok()
                });
            }
        }
    }

    /// Number of accepted writes across all documents.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn document(&self, key: &DocumentKey) -> Option<Value> {
        self.inner
            .documents
            .get(key)
            .and_then(|slot| slot.document.clone())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn commit(&self, slot: &mut Slot, document: Value) -> u64 {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        slot.commit(document)
    }
}

fn require_object(document: &Value) -> Result<(), StoreError> {
    if document.is_object() {
        Ok(())
    } else {
        Err(StoreError::Rejected("documents must be JSON objects".to_string()))
    }
}

impl RemoteStore for MemoryStore {
    async fn get(&self, key: &DocumentKey) -> Result<Snapshot, StoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .documents
            .get(key)
            .map(|slot| slot.snapshot())
            .unwrap_or(Snapshot {
                version: 0,
                document: None,
            }))
    }

    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn set(&self, key: &DocumentKey, document: Value) -> Result<u64, StoreError> {
        self.check_online()?;
        require_object(&document)?;
        let mut slot = self.inner.documents.entry(key.clone()).or_default();
        let version = self.commit(&mut slot, document);
        debug!("Set {} at version {}", key, version);
        Ok(version)
    }

    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn create(&self, key: &DocumentKey, document: Value) -> Result<u64, StoreError> {
        self.check_online()?;
        require_object(&document)?;
        let mut slot = self.inner.documents.entry(key.clone()).or_default();
        if slot.document.is_some() {
            debug!("Refusing to create existing document {}", key);
            return Err(StoreError::AlreadyExists);
        }
        let version = self.commit(&mut slot, document);
        debug!("Created {} at version {}", key, version);
        Ok(version)
    }

    #[instrument(level = "trace", skip_all, fields(key = %key))]
    async fn update(&self, key: &DocumentKey, request: UpdateRequest) -> Result<u64, StoreError> {
        self.check_online()?;
        let Some(mut slot) = self.inner.documents.get_mut(key) else {
            return Err(StoreError::NotFound);
        };
        let Some(current) = slot.document.as_ref() else {
            return Err(StoreError::NotFound);
        };
        if let Some(precondition) = &request.precondition
            && !check_precondition(Some(current), precondition)
        {
            debug!("Precondition failed for {}", key);
            return Err(StoreError::PreconditionFailed);
        }

        let mut updated = current.clone();
        apply_update(&mut updated, &request.fields).map_err(|error| {
            warn!("Rejected update to {}: {}", key, error);
            StoreError::Rejected(error.to_string())
        })?;
        let version = self.commit(&mut slot, updated);
        debug!("Updated {} to version {}", key, version);
        Ok(version)
    }

    async fn subscribe(&self, key: &DocumentKey) -> Result<Subscription, StoreError> {
        self.check_online()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut slot = self.inner.documents.entry(key.clone()).or_default();
        // Receiver is alive, so this send cannot fail.
        let _ = sender.send(Ok(slot.snapshot()));
        slot.subscribers.push(sender);
        Ok(Subscription::new(receiver, None))
    }
}
