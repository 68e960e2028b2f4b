//! Document store interface
//!
//! The document store is the durable, queryable, subscribable collection
//! that link records live in. The core only talks to it through the
//! [`DocumentStore`] trait; two adapters ship with the crate:
//!
//! - [`MemoryDocumentStore`]: in-process, used by tests and demos
//! - [`SqliteDocumentStore`](crate::storage::SqliteDocumentStore): file-backed, used by the CLI
//!
//! Subscriptions deliver full replacement snapshots: every change to the
//! collection re-sends the complete ordered result set for the predicate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;

pub(crate) mod fanout;
pub mod memory;

pub use memory::MemoryDocumentStore;

/// Field map of a stored record
pub type Fields = serde_json::Map<String, Value>;

/// A stored record with its store-assigned id
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Ordered result set delivered to a subscriber
pub type Snapshot = Vec<Document>;

/// A conjunction of field equality clauses
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    clauses: Vec<(String, Value)>,
}

impl Predicate {
    /// A predicate matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a `field == value` clause
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Check whether a record satisfies every clause
    ///
    /// A missing field never matches.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| fields.get(field) == Some(value))
    }
}

/// Result of a guarded update
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The expected fields matched and the patch was written
    Applied,
    /// The record no longer matched; nothing was written
    Conflict { current: Fields },
}

/// A live subscription to a predicate
///
/// `next()` yields snapshots in delivery order and returns `None` once the
/// store ends the stream (for example after a disconnect). The listener is
/// released exactly once, either by [`Subscription::unsubscribe`] or on drop.
pub struct Subscription {
    snapshots: mpsc::UnboundedReceiver<Snapshot>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        snapshots: mpsc::UnboundedReceiver<Snapshot>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            snapshots,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next snapshot
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.snapshots.recv().await
    }

    /// Release the listener
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Durable, subscribable record collections
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Subscribe to records in `collection` matching `predicate`
    ///
    /// The current result set is delivered immediately, then again after
    /// every change that touches the collection.
    async fn subscribe(
        &self,
        collection: &str,
        predicate: Predicate,
    ) -> Result<Subscription, StoreError>;

    /// Insert a record and return its new id
    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Fetch a record by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merge `patch` into an existing record
    ///
    /// Fails with [`StoreError::MissingRecord`] if the record does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), StoreError>;

    /// Merge `patch` only if every field in `expected` still holds
    ///
    /// The check and the write happen atomically with respect to other
    /// writers of the same store. A field absent from the record compares
    /// equal to `null`.
    async fn compare_and_update(
        &self,
        collection: &str,
        id: &str,
        expected: Fields,
        patch: Fields,
    ) -> Result<CasOutcome, StoreError>;

    /// Delete a record; deleting an absent record is a no-op
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Shared handle to a document store
pub type DocumentStoreRef = Arc<dyn DocumentStore>;

/// Check `expected` against a record's fields, treating absent as null
pub(crate) fn fields_match(expected: &Fields, actual: &Fields) -> bool {
    expected
        .iter()
        .all(|(key, value)| actual.get(key).unwrap_or(&Value::Null) == value)
}

/// Merge `patch` into `target`, overwriting existing keys
pub(crate) fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}
