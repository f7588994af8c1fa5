use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ChangeFeed, DocumentStore, StoreChange, StoreError, StoredDocument, Subscription};

/// Process-local store. Every manager sharing an instance sees the others' writes.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
    changes: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut documents = self.documents.write().await;
        let revision = documents.get(key).map_or(0, |doc| doc.revision) + 1;
        documents.insert(
            key.to_string(),
            StoredDocument {
                revision,
                value: value.to_string(),
            },
        );

        // Published under the write lock so subscribers see revisions in order.
        self.changes.publish(StoreChange {
            key: key.to_string(),
            revision,
            value: value.to_string(),
        });
        Ok(revision)
    }

    fn subscribe(&self, key: &str) -> Subscription {
        self.changes.subscribe(key)
    }
}
