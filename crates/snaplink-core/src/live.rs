//! Live queries
//!
//! A [`LiveQuery`] keeps a local, continuously refreshed copy of the links
//! matching a [`Scope`]. It owns exactly one store subscription, driven by
//! a background task:
//!
//! - every snapshot the store delivers replaces the local copy wholesale
//! - records that fail to decode, or that fall outside the scope, are dropped
//! - when the subscription ends or cannot be established, the last copy is
//!   kept, the state reports [`Connection::Reconnecting`] and the task
//!   resubscribes with exponential backoff
//!
//! Readers observe the state through a `tokio::sync::watch` channel.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::document::{DocumentStoreRef, Predicate, Snapshot};
use crate::models::{fields, Link};

/// Which links a live query follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every link owned by the user
    Owner(String),
    /// Only the user's public links
    Public(String),
}

impl Scope {
    pub fn owner_id(&self) -> &str {
        match self {
            Scope::Owner(uid) | Scope::Public(uid) => uid,
        }
    }

    /// The store predicate for this scope
    pub fn predicate(&self) -> Predicate {
        let predicate = Predicate::all().eq(fields::USER_ID, self.owner_id());
        match self {
            Scope::Owner(_) => predicate,
            Scope::Public(_) => predicate.eq(fields::IS_PUBLIC, true),
        }
    }

    /// Whether a decoded link belongs in this scope
    pub fn admits(&self, link: &Link) -> bool {
        match self {
            Scope::Owner(uid) => link.owner_id == *uid,
            Scope::Public(uid) => link.owner_id == *uid && link.is_public,
        }
    }
}

/// Connectivity of a live query's subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Connected,
    Reconnecting,
}

/// What a live query currently knows
#[derive(Debug, Clone, PartialEq)]
pub struct LiveState {
    /// `None` until the first snapshot arrives
    pub links: Option<Vec<Link>>,
    pub connection: Connection,
}

impl LiveState {
    fn loading() -> Self {
        Self {
            links: None,
            connection: Connection::Connected,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.links.is_none()
    }

    /// The current links; empty while loading
    pub fn links(&self) -> &[Link] {
        self.links.as_deref().unwrap_or_default()
    }
}

/// Floor for every resubscribe delay, so a zero setting cannot spin
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(1);

/// Backoff for resubscribing after a disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_delay: config.reconnect_initial_delay(),
            max_delay: config.reconnect_max_delay(),
        }
    }

    /// First resubscribe delay, never zero
    fn first_delay(&self) -> Duration {
        self.initial_delay.max(MIN_RECONNECT_DELAY)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay).max(MIN_RECONNECT_DELAY)
    }
}

/// A continuously refreshed view over one scope
pub struct LiveQuery {
    scope: Scope,
    state: watch::Receiver<LiveState>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl LiveQuery {
    /// Subscribe to `scope` in `collection` and start following it
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        documents: DocumentStoreRef,
        collection: impl Into<String>,
        scope: Scope,
        policy: ReconnectPolicy,
    ) -> Self {
        let (tx, state) = watch::channel(LiveState::loading());
        let task = tokio::spawn(follow(
            documents,
            collection.into(),
            scope.clone(),
            policy,
            tx,
        ));

        Self {
            scope,
            state,
            task: Some(task),
            closed: false,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// A copy of the current state
    pub fn state(&self) -> LiveState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every state change
    pub fn watch(&self) -> watch::Receiver<LiveState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `condition` and return it
    ///
    /// Returns `None` if the query was closed first.
    pub async fn wait_for(&self, condition: impl FnMut(&LiveState) -> bool) -> Option<LiveState> {
        let mut state = self.state.clone();
        let found = state.wait_for(condition).await.ok().map(|found| found.clone());
        found
    }

    /// Stop following the scope and release the subscription
    ///
    /// Further calls are no-ops. The last state stays readable.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(task) = &self.task {
            task.abort();
        }
        debug!(scope = ?self.scope, "Live query closed");
    }

    /// Close, and wait until the subscription has been released
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        self.close();
    }
}

async fn follow(
    documents: DocumentStoreRef,
    collection: String,
    scope: Scope,
    policy: ReconnectPolicy,
    tx: watch::Sender<LiveState>,
) {
    let mut delay = policy.first_delay();

    loop {
        match documents.subscribe(&collection, scope.predicate()).await {
            Ok(mut subscription) => {
                debug!(?scope, "Live query subscribed");
                while let Some(snapshot) = subscription.next().await {
                    delay = policy.first_delay();
                    let links = decode(&scope, snapshot);
                    debug!(?scope, count = links.len(), "Applied snapshot");
                    tx.send_replace(LiveState {
                        links: Some(links),
                        connection: Connection::Connected,
                    });
                }
                warn!(?scope, "Subscription ended, reconnecting");
            }
            Err(e) => {
                warn!(?scope, error = %e, retry_in = ?delay, "Subscribe failed");
            }
        }

        tx.send_if_modified(|state| {
            let changed = state.connection != Connection::Reconnecting;
            state.connection = Connection::Reconnecting;
            changed
        });

        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

/// Decode a snapshot, keeping only well-formed links inside the scope
fn decode(scope: &Scope, snapshot: Snapshot) -> Vec<Link> {
    snapshot
        .iter()
        .filter_map(|doc| match Link::from_document(doc) {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping undecodable record");
                None
            }
        })
        .filter(|link| {
            let admitted = scope.admits(link);
            if !admitted {
                warn!(id = %link.id, ?scope, "Dropping record outside scope");
            }
            admitted
        })
        .collect()
}
