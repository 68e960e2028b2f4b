//! SQLite-backed document store
//!
//! Each record is one row of the `documents` table with its fields stored
//! as JSON text. Insertion order (`seq`) is the order snapshots are
//! delivered in.
//!
//! Every write made through this store re-queries the touched collection
//! and fans the result out to the registered listeners. Commits from other
//! connections to the same file (another store instance, another process)
//! are picked up by a background task that polls `PRAGMA data_version` and
//! republishes every watched collection when it moves.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::document::fanout::SubscriberSet;
use crate::document::{
    fields_match, merge_fields, CasOutcome, Document, DocumentStore, Fields, Predicate,
    Subscription,
};
use crate::error::StoreError;
use crate::storage::schema;

/// How often the store looks for commits made by other connections
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Document store persisted in a SQLite database
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
    subscribers: SubscriberSet,
    poll_interval: Duration,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl SqliteDocumentStore {
    /// Open or create the database configured in `config`
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        Self::open_path(&config.sqlite_path())
    }

    /// Open or create a database at a specific path
    pub fn open_path(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, parent))?;
        }

        let conn = Connection::open(path)?;
        schema::prepare(&conn)?;
        debug!(path = %path.display(), "Opened SQLite document store");

        Ok(Self::with_connection(conn))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::prepare(&conn)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            subscribers: SubscriberSet::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            watcher: Mutex::new(None),
        }
    }

    /// Change how often commits from other connections are looked for
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        lock(&self.conn)
    }

    /// Start the external change watcher unless it is already running
    ///
    /// The baseline version is read here, before the caller loads its
    /// first snapshot, so no foreign commit can fall between the two.
    fn ensure_watcher(&self) -> Result<(), StoreError> {
        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if watcher.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let baseline = data_version(&self.lock())?;
        *watcher = Some(tokio::spawn(watch_external_changes(
            Arc::clone(&self.conn),
            self.subscribers.clone(),
            self.poll_interval,
            baseline,
        )));
        Ok(())
    }

    /// Number of listeners currently registered
    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.len()
    }

    fn publish(&self, conn: &Connection, collection: &str) -> Result<(), StoreError> {
        let documents = load_collection(conn, collection)?;
        self.subscribers.publish(collection, &documents);
        Ok(())
    }
}

impl Drop for SqliteDocumentStore {
    fn drop(&mut self) {
        let watcher = self.watcher.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = watcher.take() {
            task.abort();
        }
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counter that moves whenever another connection commits to the file
fn data_version(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

async fn watch_external_changes(
    conn: Arc<Mutex<Connection>>,
    subscribers: SubscriberSet,
    interval: Duration,
    baseline: i64,
) {
    let mut last_version = baseline;
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = publish_external_changes(&conn, &subscribers, &mut last_version) {
            warn!(error = %e, "Failed to check for external changes");
        }
    }
}

/// Republish every watched collection if another connection committed
fn publish_external_changes(
    conn: &Mutex<Connection>,
    subscribers: &SubscriberSet,
    last_version: &mut i64,
) -> Result<(), StoreError> {
    let conn = lock(conn);
    let version = data_version(&conn)?;
    if version == *last_version {
        return Ok(());
    }
    *last_version = version;

    for collection in subscribers.collections() {
        let documents = load_collection(&conn, &collection)?;
        subscribers.publish(&collection, &documents);
    }
    debug!(version, "Published changes from another connection");
    Ok(())
}

fn decode(id: String, json: &str) -> Result<Document, StoreError> {
    let fields: Fields = serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
        id: id.clone(),
        details: e.to_string(),
    })?;
    Ok(Document { id, fields })
}

fn encode(fields: &Fields) -> Result<String, StoreError> {
    serde_json::to_string(fields).map_err(|e| StoreError::Backend(e.to_string()))
}

fn load_collection(conn: &Connection, collection: &str) -> Result<Vec<Document>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY seq")?;
    let rows = stmt.query_map([collection], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut documents = Vec::new();
    for row in rows {
        let (id, json) = row?;
        documents.push(decode(id, &json)?);
    }
    Ok(documents)
}

fn load_one(conn: &Connection, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT fields FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    json.map(|json| decode(id.to_string(), &json)).transpose()
}

fn missing(collection: &str, id: &str) -> StoreError {
    StoreError::MissingRecord {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn subscribe(
        &self,
        collection: &str,
        predicate: Predicate,
    ) -> Result<Subscription, StoreError> {
        self.ensure_watcher()?;
        let conn = self.lock();
        let documents = load_collection(&conn, collection)?;
        Ok(self.subscribers.register(collection, predicate, &documents))
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let conn = self.lock();
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO documents (collection, id, fields) VALUES (?1, ?2, ?3)",
            params![collection, id, encode(&fields)?],
        )?;
        self.publish(&conn, collection)?;
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock();
        load_one(&conn, collection, id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut doc = load_one(&tx, collection, id)?.ok_or_else(|| missing(collection, id))?;
        merge_fields(&mut doc.fields, patch);
        tx.execute(
            "UPDATE documents SET fields = ?3 WHERE collection = ?1 AND id = ?2",
            params![collection, id, encode(&doc.fields)?],
        )?;
        tx.commit()?;

        self.publish(&conn, collection)
    }

    async fn compare_and_update(
        &self,
        collection: &str,
        id: &str,
        expected: Fields,
        patch: Fields,
    ) -> Result<CasOutcome, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut doc = load_one(&tx, collection, id)?.ok_or_else(|| missing(collection, id))?;
        if !fields_match(&expected, &doc.fields) {
            return Ok(CasOutcome::Conflict {
                current: doc.fields,
            });
        }

        merge_fields(&mut doc.fields, patch);
        tx.execute(
            "UPDATE documents SET fields = ?3 WHERE collection = ?1 AND id = ?2",
            params![collection, id, encode(&doc.fields)?],
        )?;
        tx.commit()?;

        self.publish(&conn, collection)?;
        Ok(CasOutcome::Applied)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        if removed > 0 {
            self.publish(&conn, collection)?;
        }
        Ok(())
    }
}
