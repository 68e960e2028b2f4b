//! Storage adapters
//!
//! Concrete backends for the collaborator traits, used by the CLI:
//!
//! - **SQLite**: link documents and local accounts, one database file
//! - **Filesystem**: profile picture blobs, written atomically
//!
//! The core never depends on these directly; it only sees
//! [`DocumentStore`](crate::document::DocumentStore),
//! [`BlobStore`](crate::blob::BlobStore) and
//! [`IdentityProvider`](crate::identity::IdentityProvider).

pub mod files;
pub mod schema;
pub mod sqlite;

pub use files::FsBlobStore;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteDocumentStore;
