//! Link command handlers

use anyhow::{bail, Context, Result};

use snaplink_core::ToggleOutcome;

use crate::app::{user_error, App};
use crate::output::{short_id, Output};
use crate::prompt::confirm;

/// Add one or more links
///
/// Valid URLs are saved even when others in the same batch are rejected.
pub async fn add(app: &App, urls: Vec<String>, output: &Output) -> Result<()> {
    let mut manage = app.manage();
    for (index, url) in urls.into_iter().enumerate() {
        if index > 0 {
            manage.add_entry();
        }
        manage.edit_entry(index, url);
    }

    let report = manage.commit().await;
    manage.close();

    for link in &report.persisted {
        output.success(&format!("Added {} ({})", link.url, short_id(&link.id)));
    }
    for (index, value) in manage.pending().into_iter().enumerate() {
        if let Some(error) = manage.entry_error(index) {
            output.warning(&format!("{}: {}", value, error));
        }
    }

    if let Some(notification) = report.notification {
        bail!("{}", notification);
    }
    if report.persisted.is_empty() {
        bail!("No links were added");
    }
    Ok(())
}

/// List the signed-in user's links
pub async fn list(app: &App, public_only: bool, output: &Output) -> Result<()> {
    let mut links = app.owner_links().await?;
    if public_only {
        links.retain(|link| link.is_public);
    }

    output.print_links(&links);
    Ok(())
}

/// Flip a link between public and private
pub async fn toggle(app: &App, id: String, output: &Output) -> Result<()> {
    let link = app.resolve_link(&id).await?;
    let mut manage = app.manage();
    let outcome = manage
        .toggle_visibility(&link.id, link.is_public)
        .await
        .map_err(user_error);
    manage.close();

    match outcome? {
        ToggleOutcome::Applied { is_public } => {
            output.success(&format!(
                "{} is now {}",
                link.url,
                if is_public { "public" } else { "private" }
            ));
        }
        ToggleOutcome::Superseded { current } => {
            output.message(&format!(
                "{} was changed elsewhere and is already {}",
                link.url,
                if current { "public" } else { "private" }
            ));
        }
    }
    Ok(())
}

/// Delete a link
pub async fn delete(app: &App, id: String, yes: bool, output: &Output) -> Result<()> {
    let link = app.resolve_link(&id).await?;

    if !yes && output.should_prompt() && !confirm(&format!("Delete link '{}'?", link.url))? {
        println!("Cancelled.");
        return Ok(());
    }

    let mut manage = app.manage();
    let removed = manage.remove_link(&link.id).await.map_err(user_error);
    manage.close();
    removed?;

    output.success(&format!("Deleted link: {}", link.id));
    Ok(())
}

/// Open a link in the default browser
pub async fn open(app: &App, id: String, output: &Output) -> Result<()> {
    let link = app.resolve_link(&id).await?;

    open::that(&link.url).with_context(|| format!("Failed to open {}", link.url))?;

    output.message(&format!("Opened {}", link.url));
    Ok(())
}
