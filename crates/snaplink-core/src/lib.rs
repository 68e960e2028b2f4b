//! SnapLink Core Library
//!
//! This crate provides the core functionality for SnapLink: a registered
//! user curates a personal set of URLs, marks each one public or private,
//! and publishes a stable share page that shows visitors only the public
//! subset.
//!
//! # Architecture
//!
//! - **Collaborators** (traits): [`DocumentStore`], [`IdentityProvider`],
//!   [`BlobStore`] and [`Clipboard`]. Adapters ship alongside the core
//!   (in-memory, SQLite, filesystem), but the core only sees the traits.
//! - **Live queries**: owner-scoped and public-scoped views that are kept
//!   current by store subscriptions delivering full replacement snapshots.
//! - **Controllers**: [`ManagementController`] for the owner and
//!   [`SharingView`] for visitors.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let documents = Arc::new(SqliteDocumentStore::open(&config)?);
//! let session = Session::new(Arc::new(LocalIdentityProvider::open(&config)?));
//! let links = LinkStore::new(documents, &config.links_collection);
//!
//! let mut manage = ManagementController::new(session, links, &config.origin, policy);
//! manage.edit_entry(0, "https://example.com");
//! let report = manage.commit().await;
//! ```
//!
//! # Modules
//!
//! - `links`: CRUD over link records (main entry point for data)
//! - `live`: Live queries with reconnect
//! - `manage`: Management controller
//! - `sharing`: Sharing view controller and share URLs
//! - `session`: The signed-in session
//! - `profile`: Profile pictures and summary
//! - `document`, `identity`, `blob`: Collaborator interfaces
//! - `storage`: SQLite and filesystem adapters
//! - `config`: Application configuration

pub mod blob;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod links;
pub mod live;
pub mod manage;
pub mod models;
pub mod profile;
pub mod session;
pub mod sharing;
pub mod storage;
pub mod validation;

pub use blob::{BlobStore, BlobStoreRef};
pub use config::Config;
pub use document::{DocumentStore, DocumentStoreRef, MemoryDocumentStore};
pub use error::{
    AuthError, ClipboardError, NotFoundError, Notification, SnapLinkError, StoreError,
    ValidationError,
};
pub use identity::{IdentityProvider, IdentityProviderRef, LocalIdentityProvider};
pub use links::{CandidateOutcome, LinkStore, ToggleOutcome};
pub use live::{Connection, LiveQuery, LiveState, ReconnectPolicy, Scope};
pub use manage::{CommitReport, ManagementController};
pub use models::{Link, UserIdentity};
pub use profile::{ProfileService, ProfileSummary};
pub use session::Session;
pub use sharing::{Clipboard, ProfileImage, SharedLinksState, SharingOptions, SharingView};
pub use storage::{FsBlobStore, SqliteDocumentStore};
