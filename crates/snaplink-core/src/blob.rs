//! Blob store interface
//!
//! Holds binary objects such as profile pictures, addressed by slash
//! separated paths.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{SnapLinkError, StoreError};

/// Binary object storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any previous object
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Resolve a URL for the object at `path`
    ///
    /// Fails with [`SnapLinkError::NotFound`] when nothing is stored there,
    /// or [`SnapLinkError::Store`] when the store itself failed.
    async fn resolve_url(&self, path: &str) -> Result<String, SnapLinkError>;
}

/// Shared handle to a blob store
pub type BlobStoreRef = Arc<dyn BlobStore>;

/// Blob path of a user's profile picture
pub fn profile_picture_path(uid: &str) -> String {
    format!("profile_pictures/{uid}")
}
