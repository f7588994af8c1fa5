mod memory_store;
mod sqlite_store;
mod types;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::debug;

pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use types::{StoreChange, StoreError, StoredDocument};

pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    /// Nothing survives a restart.
    Memory,
}

pub fn open_store(kind: StoreKind, database_path: &Path) -> Arc<dyn DocumentStore> {
    match kind {
        StoreKind::Sqlite => Arc::new(SqliteStore::new(database_path)),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Keyed document storage with change notification.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Prepares the backend. Called once before the store is reported ready.
    async fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Replaces the document and returns its new revision.
    async fn set(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    fn subscribe(&self, key: &str) -> Subscription;
}

/// Change listener for one key. Dropping it unsubscribes.
pub struct Subscription {
    key: String,
    receiver: broadcast::Receiver<StoreChange>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Result<StoreChange, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(key = %self.key, "Unsubscribed from document changes");
    }
}

/// Per-key broadcast fan-out shared by the store implementations.
#[derive(Default)]
pub(crate) struct ChangeFeed {
    senders: Mutex<HashMap<String, broadcast::Sender<StoreChange>>>,
}

impl ChangeFeed {
    pub fn subscribe(&self, key: &str) -> Subscription {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = senders
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0);

        debug!(key, subscribers = sender.receiver_count() + 1, "Subscribed to document changes");
        Subscription {
            key: key.to_string(),
            receiver: sender.subscribe(),
        }
    }

    pub fn publish(&self, change: StoreChange) {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = senders.get(&change.key) {
            // No receivers is not an error: nobody is watching this key right now.
            let _ = sender.send(change);
        }
    }
}
