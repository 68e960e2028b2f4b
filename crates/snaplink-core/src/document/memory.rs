//! In-memory document store
//!
//! Keeps every collection as an insertion-ordered list. Useful for tests
//! and for running the controllers without any backing service. Offline
//! mode simulates a lost connection: subscribers are disconnected and every
//! call fails with [`StoreError::Unavailable`] until the store comes back.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::fanout::SubscriberSet;
use super::{
    fields_match, merge_fields, CasOutcome, Document, DocumentStore, Fields, Predicate,
    Subscription,
};
use crate::error::StoreError;

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    offline: bool,
}

/// Document store held entirely in process memory
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<State>,
    subscribers: SubscriberSet,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        let state = self.lock();
        if state.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(state)
    }

    /// Go offline (disconnecting every subscriber) or come back online
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
        if offline {
            self.subscribers.disconnect_all();
        }
        debug!(offline, "Memory store connectivity changed");
    }

    /// End every subscription stream without going offline
    pub fn disconnect_subscribers(&self) {
        self.subscribers.disconnect_all();
    }

    /// Number of listeners currently registered
    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of records in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.lock().collections.get(collection).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn publish(&self, state: &State, collection: &str) {
        let documents = state
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.subscribers.publish(collection, documents);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn subscribe(
        &self,
        collection: &str,
        predicate: Predicate,
    ) -> Result<Subscription, StoreError> {
        let state = self.online()?;
        let documents = state
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(self.subscribers.register(collection, predicate, documents))
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let mut state = self.online()?;
        let id = Uuid::new_v4().to_string();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });
        self.publish(&state, collection);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let state = self.online()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), StoreError> {
        let mut state = self.online()?;
        let doc = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::MissingRecord {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_fields(&mut doc.fields, patch);
        self.publish(&state, collection);
        Ok(())
    }

    async fn compare_and_update(
        &self,
        collection: &str,
        id: &str,
        expected: Fields,
        patch: Fields,
    ) -> Result<CasOutcome, StoreError> {
        let mut state = self.online()?;
        let doc = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::MissingRecord {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        if !fields_match(&expected, &doc.fields) {
            return Ok(CasOutcome::Conflict {
                current: doc.fields.clone(),
            });
        }

        merge_fields(&mut doc.fields, patch);
        self.publish(&state, collection);
        Ok(CasOutcome::Applied)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut state = self.online()?;
        let Some(docs) = state.collections.get_mut(collection) else {
            return Ok(());
        };
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        if docs.len() != before {
            self.publish(&state, collection);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryDocumentStore::new();
        let id = store
            .insert("links", fields(json!({ "link": "https://a.com" })))
            .await
            .unwrap();

        let doc = store.get("links", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["link"], json!("https://a.com"));
        assert!(store.get("links", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = MemoryDocumentStore::new();
        let a = store.insert("links", Fields::new()).await.unwrap();
        store.delete("links", &a).await.unwrap();
        let b = store.insert("links", Fields::new()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update("links", "nope", fields(json!({ "isPublic": true })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingRecord { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryDocumentStore::new();
        let id = store.insert("links", Fields::new()).await.unwrap();
        store.delete("links", &id).await.unwrap();
        store.delete("links", &id).await.unwrap();
        store.delete("never-created", "x").await.unwrap();
        assert!(store.is_empty("links"));
    }

    #[tokio::test]
    async fn test_compare_and_update() {
        let store = MemoryDocumentStore::new();
        let id = store
            .insert("links", fields(json!({ "isPublic": false })))
            .await
            .unwrap();

        let applied = store
            .compare_and_update(
                "links",
                &id,
                fields(json!({ "isPublic": false })),
                fields(json!({ "isPublic": true })),
            )
            .await
            .unwrap();
        assert_eq!(applied, CasOutcome::Applied);

        let conflict = store
            .compare_and_update(
                "links",
                &id,
                fields(json!({ "isPublic": false })),
                fields(json!({ "isPublic": true })),
            )
            .await
            .unwrap();
        assert!(matches!(conflict, CasOutcome::Conflict { ref current } if current["isPublic"] == json!(true)));
    }

    #[tokio::test]
    async fn test_subscription_receives_replacement_snapshots() {
        let store = MemoryDocumentStore::new();
        let mut sub = store
            .subscribe("links", Predicate::all().eq("userId", "u1"))
            .await
            .unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        store
            .insert("links", fields(json!({ "userId": "u1" })))
            .await
            .unwrap();
        store
            .insert("links", fields(json!({ "userId": "u2" })))
            .await
            .unwrap();

        assert_eq!(sub.next().await.unwrap().len(), 1);
        assert_eq!(sub.next().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_disconnects_and_fails() {
        let store = MemoryDocumentStore::new();
        let mut sub = store.subscribe("links", Predicate::all()).await.unwrap();
        sub.next().await.unwrap();

        store.set_offline(true);
        assert!(sub.next().await.is_none());
        assert_eq!(store.active_subscriptions(), 0);

        let err = store.insert("links", Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.subscribe("links", Predicate::all()).await.is_err());

        store.set_offline(false);
        assert!(store.insert("links", Fields::new()).await.is_ok());
    }
}
