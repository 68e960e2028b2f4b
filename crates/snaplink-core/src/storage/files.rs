//! Filesystem blob store
//!
//! Stores each blob as a file under a root directory (by default
//! `<data_dir>/blobs`). Writes are atomic: write to a temp file, sync,
//! then rename. Resolved URLs are `file://` URLs.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::error::{NotFoundError, SnapLinkError, StoreError};

/// Blob store backed by a directory
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Blob store rooted at the configured blobs directory
    pub fn new(config: &Config) -> Self {
        Self::with_root(config.blobs_dir())
    }

    /// Blob store rooted at a specific directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a blob path to a file below the root
    ///
    /// Only plain relative segments are accepted, so a blob path can never
    /// escape the root directory.
    fn file_path(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !plain {
            return Err(StoreError::PermissionDenied(format!(
                "invalid blob path '{path}'"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.file_path(path)?;
        atomic_write(&target, bytes)?;
        debug!(path, size = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn resolve_url(&self, path: &str) -> Result<String, SnapLinkError> {
        let target = self.file_path(path)?;
        if !target.is_file() {
            return Err(NotFoundError {
                path: path.to_string(),
            }
            .into());
        }

        let absolute = target
            .canonicalize()
            .map_err(|e| StoreError::from_io(e, &target))?;
        let url = Url::from_file_path(&absolute).map_err(|_| {
            StoreError::Backend(format!("cannot build a URL for {}", absolute.display()))
        })?;
        Ok(url.to_string())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, parent))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path).map_err(|e| StoreError::from_io(e, &temp_path))?;
    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, &temp_path))?;
    file.sync_all()
        .map_err(|e| StoreError::from_io(e, &temp_path))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::from_io(e, path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_resolve() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::with_root(temp_dir.path());

        store
            .put("profile_pictures/u1", b"\x89PNG fake")
            .await
            .unwrap();

        let url = store.resolve_url("profile_pictures/u1").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/profile_pictures/u1"));
        assert_eq!(
            fs::read(temp_dir.path().join("profile_pictures/u1")).unwrap(),
            b"\x89PNG fake"
        );
    }

    #[tokio::test]
    async fn test_put_replaces_previous() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::with_root(temp_dir.path());

        store.put("a/b", b"one").await.unwrap();
        store.put("a/b", b"two").await.unwrap();
        assert_eq!(fs::read(temp_dir.path().join("a/b")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::with_root(temp_dir.path());

        let err = store.resolve_url("profile_pictures/nobody").await.unwrap_err();
        assert!(matches!(err, SnapLinkError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::with_root(temp_dir.path());

        assert!(store.put("../outside", b"x").await.is_err());
        assert!(store.put("/etc/passwd", b"x").await.is_err());
        assert!(store.put("", b"x").await.is_err());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("a").join("b").join("file.bin");

        atomic_write(&nested_path, b"test data").unwrap();

        assert_eq!(fs::read_to_string(&nested_path).unwrap(), "test data");
    }
}
