//! The remote document store the online mode synchronizes through.

use std::future::Future;

use serde_json::Value;
use sweeper_common::protocol::{DocumentKey, Snapshot, UpdateRequest};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::StoreError;

mod http;
mod memory;
mod websocket;

pub use http::HttpStore;
pub use memory::MemoryStore;

/// Item delivered to a subscriber: a full snapshot or a listen failure.
pub type Notification = Result<Snapshot, StoreError>;

/// Durable key/value document store.
///
/// Every accepted write bumps the document's version, and subscribers see
/// snapshots in non-decreasing version order. Intermediate versions may be
/// skipped, so each snapshot must be treated as the complete state.
pub trait RemoteStore: Send + Sync {
    /// Point read. The snapshot's document is `None` when absent.
    fn get(&self, key: &DocumentKey) -> impl Future<Output = Result<Snapshot, StoreError>> + Send;

    /// Full overwrite; creates the document when absent.
    fn set(
        &self,
        key: &DocumentKey,
        document: Value,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Writes the document only if it does not exist yet, otherwise fails
    /// with [`StoreError::AlreadyExists`].
    fn create(
        &self,
        key: &DocumentKey,
        document: Value,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Partial dot-path update. Fails with [`StoreError::NotFound`] when the
    /// document is absent and [`StoreError::PreconditionFailed`] when the
    /// request's precondition does not hold; nothing is written in either case.
    fn update(
        &self,
        key: &DocumentKey,
        request: UpdateRequest,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Starts listening for changes. The current state is delivered first.
    fn subscribe(
        &self,
        key: &DocumentKey,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}

/// Stream of snapshots for one document. Dropping it stops the listener.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Notification>,
    listener: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<Notification>,
        listener: Option<JoinHandle<()>>,
    ) -> Self {
        Self { receiver, listener }
    }

    /// Waits for the next notification. `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Returns a notification that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
