//! The persistent store collaborator.
//!
//! Plugins persist settings and notes as JSON documents in named collections.
//! The host only hands out collections; it stores nothing itself.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// A JSON object used as filter, document or update.
pub type Document = Map<String, Value>;

/// A named set of documents.
#[async_trait]
pub trait Collection: Send + Sync {
    /// First document whose fields equal every field of `filter`.
    async fn find_one(&self, filter: &Document) -> StoreResult<Option<Document>>;

    /// Every document matching `filter`, in insertion order.
    async fn find(&self, filter: &Document) -> StoreResult<Vec<Document>>;

    /// Sets `fields` on the first document matching `filter`. With `upsert`,
    /// inserts `filter ∪ fields` when nothing matches.
    async fn update_one(&self, filter: &Document, fields: Document, upsert: bool)
    -> StoreResult<()>;

    /// Deletes the first matching document. Returns whether one was removed.
    async fn delete_one(&self, filter: &Document) -> StoreResult<bool>;
}

/// A document-oriented store handing out per-name collections.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Flushes and disconnects.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Shared store handle.
pub type BoxedStore = Arc<dyn DocumentStore>;

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

/// Builds a [`Document`] from a JSON object literal.
///
/// Non-object values are rejected.
pub fn document(value: Value) -> StoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected an object, got {other}"
        ))),
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// A process-local store. Useful for tests and for running without a database.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        if let Some(existing) = self.collections.read().get(name) {
            return existing.clone();
        }
        self.collections
            .write()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

/// A collection held by [`MemoryStore`].
#[derive(Default)]
pub struct MemoryCollection {
    docs: RwLock<Vec<Document>>,
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn find_one(&self, filter: &Document) -> StoreResult<Option<Document>> {
        Ok(self.docs.read().iter().find(|d| matches(d, filter)).cloned())
    }

    async fn find(&self, filter: &Document) -> StoreResult<Vec<Document>> {
        Ok(self
            .docs
            .read()
            .iter()
            .filter(|d| matches(d, filter))
            .cloned()
            .collect())
    }

    async fn update_one(
        &self,
        filter: &Document,
        fields: Document,
        upsert: bool,
    ) -> StoreResult<()> {
        let mut docs = self.docs.write();
        if let Some(doc) = docs.iter_mut().find(|d| matches(d, filter)) {
            doc.extend(fields);
        } else if upsert {
            let mut doc = filter.clone();
            doc.extend(fields);
            docs.push(doc);
        }
        Ok(())
    }

    async fn delete_one(&self, filter: &Document) -> StoreResult<bool> {
        let mut docs = self.docs.write();
        match docs.iter().position(|d| matches(d, filter)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_then_update() {
        let store = MemoryStore::new();
        let notes = store.collection("NOTES");
        let key = document(json!({ "chat_id": 1 })).unwrap();

        notes
            .update_one(&key, document(json!({ "text": "a" })).unwrap(), false)
            .await
            .unwrap();
        assert!(notes.find_one(&key).await.unwrap().is_none());

        notes
            .update_one(&key, document(json!({ "text": "a" })).unwrap(), true)
            .await
            .unwrap();
        notes
            .update_one(&key, document(json!({ "text": "b" })).unwrap(), true)
            .await
            .unwrap();

        let found = notes.find(&key).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["text"], "b");
        assert_eq!(found[0]["chat_id"], 1);
    }

    #[tokio::test]
    async fn collections_are_shared_by_name() {
        let store = MemoryStore::new();
        let key = document(json!({ "id": 7 })).unwrap();
        store
            .collection("STAFF")
            .update_one(&key, Document::new(), true)
            .await
            .unwrap();

        assert!(store.collection("STAFF").find_one(&key).await.unwrap().is_some());
        assert!(store.collection("OTHER").find_one(&key).await.unwrap().is_none());
        assert!(store.collection("STAFF").delete_one(&key).await.unwrap());
        assert!(!store.collection("STAFF").delete_one(&key).await.unwrap());
    }

    #[test]
    fn document_rejects_non_objects() {
        assert!(document(json!([1, 2])).is_err());
    }
}
