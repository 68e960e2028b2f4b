//! Subscriber bookkeeping shared by the store adapters

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::{Document, Predicate, Snapshot, Subscription};

struct Subscriber {
    collection: String,
    predicate: Predicate,
    tx: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: BTreeMap<u64, Subscriber>,
}

/// Live listeners of a store, keyed by registration order
#[derive(Clone, Default)]
pub(crate) struct SubscriberSet {
    registry: Arc<Mutex<Registry>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener and deliver its first snapshot
    ///
    /// `documents` is the full collection at registration time; callers
    /// must hold their own data lock across this call so no write slips in
    /// between computing it and registering.
    pub fn register(
        &self,
        collection: &str,
        predicate: Predicate,
        documents: &[Document],
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(filter(&predicate, documents));

        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.insert(
                id,
                Subscriber {
                    collection: collection.to_string(),
                    predicate,
                    tx,
                },
            );
            id
        };
        debug!(collection, subscriber = id, "Subscriber registered");

        let registry = Arc::downgrade(&self.registry);
        Subscription::new(rx, move || {
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                if registry.subscribers.remove(&id).is_some() {
                    debug!(subscriber = id, "Subscriber released");
                }
            }
        })
    }

    /// Send a fresh snapshot to every listener of `collection`
    ///
    /// Listeners whose receiving side is gone are dropped.
    pub fn publish(&self, collection: &str, documents: &[Document]) {
        let mut registry = self.lock();
        registry.subscribers.retain(|_, subscriber| {
            if subscriber.collection != collection {
                return true;
            }
            subscriber
                .tx
                .send(filter(&subscriber.predicate, documents))
                .is_ok()
        });
    }

    /// Drop every listener, ending their snapshot streams
    pub fn disconnect_all(&self) {
        let dropped = std::mem::take(&mut self.lock().subscribers);
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Disconnected subscribers");
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Collections with at least one listener, each listed once
    pub fn collections(&self) -> Vec<String> {
        let mut collections: Vec<String> = self
            .lock()
            .subscribers
            .values()
            .map(|subscriber| subscriber.collection.clone())
            .collect();
        collections.sort();
        collections.dedup();
        collections
    }
}

fn filter(predicate: &Predicate, documents: &[Document]) -> Snapshot {
    documents
        .iter()
        .filter(|doc| predicate.matches(&doc.fields))
        .cloned()
        .collect()
}
