//! Profile pictures and the profile summary

use tracing::info;

use crate::blob::{profile_picture_path, BlobStoreRef};
use crate::error::Result;
use crate::models::UserIdentity;
use crate::session::Session;

/// What the profile page shows for the signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub display_name: String,
    pub email: String,
    /// The user's picture, or the placeholder when none was uploaded
    pub photo_url: String,
}

pub struct ProfileService {
    session: Session,
    blobs: BlobStoreRef,
    placeholder_image_url: String,
}

impl ProfileService {
    pub fn new(session: Session, blobs: BlobStoreRef, placeholder_image_url: impl Into<String>) -> Self {
        Self {
            session,
            blobs,
            placeholder_image_url: placeholder_image_url.into(),
        }
    }

    /// Store a new profile picture and point the identity at it
    ///
    /// Replaces any previous picture. Every failure here is user-visible.
    pub async fn upload_picture(&self, bytes: &[u8]) -> Result<UserIdentity> {
        let user = self.session.require()?;
        let path = profile_picture_path(&user.uid);

        self.blobs.put(&path, bytes).await?;
        let url = self.blobs.resolve_url(&path).await?;
        let updated = self.session.provider().update_photo_url(&url).await?;

        info!(uid = %updated.uid, size = bytes.len(), "Uploaded profile picture");
        Ok(updated)
    }

    /// Summary of the signed-in user; `None` when signed out
    pub fn profile_summary(&self) -> Option<ProfileSummary> {
        let user = self.session.current()?;
        Some(ProfileSummary {
            display_name: user.display_name_or_default().to_string(),
            photo_url: user
                .photo_url
                .clone()
                .unwrap_or_else(|| self.placeholder_image_url.clone()),
            email: user.email,
        })
    }
}
