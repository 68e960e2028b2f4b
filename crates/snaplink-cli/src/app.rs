//! Wiring of the core services for one CLI invocation

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::time::timeout;

use snaplink_core::{
    BlobStoreRef, Config, FsBlobStore, Link, LinkStore, LiveQuery, LiveState,
    LocalIdentityProvider, ManagementController, ProfileService, ReconnectPolicy, Scope, Session,
    SnapLinkError, SqliteDocumentStore,
};

/// How long a command waits for the first snapshot of a live query
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// The core services, opened against the configured data directory
pub struct App {
    pub config: Config,
    pub session: Session,
    pub links: LinkStore,
    pub blobs: BlobStoreRef,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let documents =
            SqliteDocumentStore::open(&config).context("Failed to open the link database")?;
        let identity =
            LocalIdentityProvider::open(&config).context("Failed to open the account database")?;
        let blobs: BlobStoreRef = Arc::new(FsBlobStore::new(&config));

        Ok(Self {
            session: Session::new(Arc::new(identity)),
            links: LinkStore::new(Arc::new(documents), config.links_collection.clone()),
            blobs,
            config,
        })
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::from_config(&self.config)
    }

    pub fn manage(&self) -> ManagementController {
        ManagementController::new(
            self.session.clone(),
            self.links.clone(),
            self.config.origin.clone(),
            self.reconnect_policy(),
        )
    }

    pub fn profile(&self) -> ProfileService {
        ProfileService::new(
            self.session.clone(),
            self.blobs.clone(),
            self.config.placeholder_image_url.clone(),
        )
    }

    /// Every link of the signed-in user, in store order
    pub async fn owner_links(&self) -> Result<Vec<Link>> {
        let user = self.session.require().map_err(user_error)?;
        let live = self
            .links
            .watch(Scope::Owner(user.uid), self.reconnect_policy());
        let state = wait_ready(&live).await?;
        live.shutdown().await;
        Ok(state.links.unwrap_or_default())
    }

    /// Find one of the signed-in user's links by id or unique id prefix
    pub async fn resolve_link(&self, id: &str) -> Result<Link> {
        let links = self.owner_links().await?;
        match_prefix(&links, id).cloned()
    }
}

/// Wait for the first snapshot of a live query
pub async fn wait_ready(live: &LiveQuery) -> Result<LiveState> {
    timeout(READY_TIMEOUT, live.wait_for(|state| !state.is_loading()))
        .await
        .context("Timed out waiting for the link store")?
        .ok_or_else(|| anyhow!("Live query closed before any links arrived"))
}

/// Turn a core error into the message a user should see
pub fn user_error(error: SnapLinkError) -> anyhow::Error {
    match error.notification() {
        Some(notification) => anyhow!("{}", notification),
        None => anyhow!("{}", error),
    }
}

/// Match a link id (full or prefix)
fn match_prefix<'a>(links: &'a [Link], id: &str) -> Result<&'a Link> {
    if let Some(link) = links.iter().find(|link| link.id == id) {
        return Ok(link);
    }

    let matches: Vec<_> = links.iter().filter(|link| link.id.starts_with(id)).collect();
    match matches.as_slice() {
        [] => bail!("No link found matching: {}", id),
        [link] => Ok(link),
        _ => {
            eprintln!("Multiple links match '{}':", id);
            for link in &matches {
                eprintln!("  {} - {}", link.id, link.url);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}
