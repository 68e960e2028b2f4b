//! Share page command handlers

use anyhow::Result;
use tracing::debug;

use snaplink_core::{SharingOptions, SharingView};

use crate::app::{user_error, wait_ready, App};
use crate::clipboard::TerminalClipboard;
use crate::output::Output;

/// Options for `snaplink share`
pub struct ShareArgs {
    /// Whose page to show; the signed-in user when absent
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub copy: bool,
    pub watch: bool,
}

/// Show someone's public links the way a visitor sees them
pub async fn show(app: &App, args: ShareArgs, output: &Output) -> Result<()> {
    let (user_id, user_name) = match args.user_id {
        Some(user_id) => {
            let user_name = args.user_name.unwrap_or_else(|| "User".to_string());
            (user_id, user_name)
        }
        None => {
            let user = app.session.require().map_err(user_error)?;
            let user_name = args
                .user_name
                .unwrap_or_else(|| user.display_name_or_default().to_string());
            (user.uid, user_name)
        }
    };

    let mut view = SharingView::open(
        &app.links,
        &app.blobs,
        SharingOptions::from_config(&app.config),
        &user_id,
        &user_name,
    )
    .await
    .map_err(|e| user_error(e.into()))?;

    wait_ready(view.live()).await?;
    print(&view, output);

    if args.copy {
        match view.copy_share_link(&TerminalClipboard).await {
            Ok(()) => output.success("Copied share link to clipboard"),
            Err(e) => output.warning(&e.to_string()),
        }
    }

    if args.watch {
        follow(&view, output).await;
    }

    view.close();
    Ok(())
}

/// Reprint the page on every change until interrupted
async fn follow(view: &SharingView, output: &Output) {
    let mut states = view.live().watch();
    states.mark_unchanged();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!(connection = ?states.borrow().connection, "Shared links changed");
                println!();
                print(view, output);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
}

fn print(view: &SharingView, output: &Output) {
    output.print_shared(
        view.user_name(),
        view.image_url(),
        view.share_url(),
        &view.state(),
    );
}
