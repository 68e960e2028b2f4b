//! Profile command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::app::{user_error, App};
use crate::output::Output;

/// Upload a new profile picture from a local file
pub async fn picture(app: &App, path: PathBuf, output: &Output) -> Result<()> {
    let bytes =
        std::fs::read(&path).with_context(|| format!("Failed to read image: {:?}", path))?;

    let user = app
        .profile()
        .upload_picture(&bytes)
        .await
        .map_err(user_error)?;

    output.success(&format!(
        "Updated profile picture: {}",
        user.photo_url.as_deref().unwrap_or_default()
    ));
    Ok(())
}
