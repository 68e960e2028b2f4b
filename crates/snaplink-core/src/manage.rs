//! Management controller
//!
//! Drives the owner's management view: an editable list of pending URLs
//! that is validated and committed in one go, plus pass-through visibility
//! toggles and deletions for already stored links.
//!
//! Store mutations run on detached tasks. Dropping the caller's future
//! discards the result but never cancels the write itself.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::error::{Notification, Result, SnapLinkError, StoreError, ValidationError};
use crate::links::{CandidateOutcome, LinkStore, ToggleOutcome};
use crate::live::{LiveQuery, LiveState, ReconnectPolicy, Scope};
use crate::models::Link;
use crate::session::Session;
use crate::sharing::share_url;
use crate::validation::validate_link;

/// One row of the pending list
#[derive(Debug, Clone, Default, PartialEq)]
struct PendingEntry {
    value: String,
    error: Option<ValidationError>,
}

/// Summary of one commit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    /// Links written by this commit, in pending-list order
    pub persisted: Vec<Link>,
    /// Entries flagged inline and kept pending
    pub rejected: usize,
    /// Entries whose store call failed; they stay pending too
    pub failed: usize,
    /// The single blocking message for this commit, if any
    pub notification: Option<Notification>,
}

/// Controller behind the owner's management view
pub struct ManagementController {
    session: Session,
    links: LinkStore,
    origin: String,
    policy: ReconnectPolicy,
    pending: Vec<PendingEntry>,
    live: Option<LiveQuery>,
}

impl ManagementController {
    /// Create the controller and start following the owner's links
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        session: Session,
        links: LinkStore,
        origin: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        let mut controller = Self {
            session,
            links,
            origin: origin.into(),
            policy,
            pending: vec![PendingEntry::default()],
            live: None,
        };
        controller.sync_session();
        controller
    }

    /// Point the owner live query at whoever is signed in now
    ///
    /// Starts, restarts or stops the query as needed; a no-op when the
    /// signed-in user has not changed.
    pub fn sync_session(&mut self) {
        let uid = self.session.current().map(|user| user.uid);
        let current = self.live.as_ref().map(|live| live.scope().owner_id());
        if current == uid.as_deref() {
            return;
        }

        if let Some(mut live) = self.live.take() {
            live.close();
        }
        if let Some(uid) = uid {
            debug!(%uid, "Following owner links");
            self.live = Some(self.links.watch(Scope::Owner(uid), self.policy));
        }
    }

    // ===== Pending list =====

    /// Current pending values, in order
    pub fn pending(&self) -> Vec<&str> {
        self.pending.iter().map(|entry| entry.value.as_str()).collect()
    }

    /// Append a blank entry
    pub fn add_entry(&mut self) {
        self.pending.push(PendingEntry::default());
    }

    /// Remove the entry at `index`; out-of-range indexes are ignored
    ///
    /// Removing the last entry reseeds the list with a blank one.
    pub fn remove_entry(&mut self, index: usize) {
        if index < self.pending.len() {
            self.pending.remove(index);
        }
        self.reseed();
    }

    /// Replace the value at `index`, clearing its inline error
    pub fn edit_entry(&mut self, index: usize, value: impl Into<String>) {
        if let Some(entry) = self.pending.get_mut(index) {
            entry.value = value.into();
            entry.error = None;
        }
    }

    /// The inline error flagged on the entry at `index` by the last commit
    pub fn entry_error(&self, index: usize) -> Option<&ValidationError> {
        self.pending.get(index).and_then(|entry| entry.error.as_ref())
    }

    fn reseed(&mut self) {
        if self.pending.is_empty() {
            self.pending.push(PendingEntry::default());
        }
    }

    // ===== Mutations =====

    /// Validate the pending entries and persist the ones that pass
    ///
    /// Without a signed-in user nothing is validated or written and the
    /// report carries a "please log in" notification.
    pub async fn commit(&mut self) -> CommitReport {
        let mut report = CommitReport::default();

        let user = match self.session.require() {
            Ok(user) => user,
            Err(e) => {
                report.notification = e.notification();
                return report;
            }
        };

        let mut submitted = Vec::new();
        for (index, entry) in self.pending.iter_mut().enumerate() {
            match validate_link(&entry.value) {
                Ok(url) => {
                    entry.error = None;
                    submitted.push((index, url));
                }
                Err(e) => {
                    entry.error = Some(e);
                    report.rejected += 1;
                }
            }
        }

        let links = self.links.clone();
        let owner_id = user.uid.clone();
        let urls: Vec<String> = submitted.iter().map(|(_, url)| url.clone()).collect();
        let outcomes = match detached(async move { Ok(links.add_links(&owner_id, urls).await) })
            .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                report.failed = submitted.len();
                report.notification = e.notification();
                return report;
            }
        };

        let mut first_failure: Option<StoreError> = None;
        let mut persisted_indexes = Vec::new();
        for ((index, _), outcome) in submitted.into_iter().zip(outcomes) {
            match outcome {
                CandidateOutcome::Persisted(link) => {
                    persisted_indexes.push(index);
                    report.persisted.push(link);
                }
                CandidateOutcome::Rejected(e) => {
                    self.pending[index].error = Some(e);
                    report.rejected += 1;
                }
                CandidateOutcome::Failed(e) => {
                    warn!(error = %e, "Failed to add link");
                    report.failed += 1;
                    first_failure.get_or_insert(e);
                }
            }
        }

        for index in persisted_indexes.into_iter().rev() {
            self.pending.remove(index);
        }
        self.reseed();

        report.notification = first_failure.and_then(|e| SnapLinkError::from(e).notification());
        info!(
            persisted = report.persisted.len(),
            rejected = report.rejected,
            failed = report.failed,
            "Committed pending links"
        );
        report
    }

    /// Toggle a link's visibility, guarded by the value the view showed
    pub async fn toggle_visibility(&self, link_id: &str, observed: bool) -> Result<ToggleOutcome> {
        let owner = self.session.require()?;
        let links = self.links.clone();
        let link_id = link_id.to_string();

        detached(async move {
            ensure_owner(&links, &link_id, &owner.uid).await?;
            Ok(links.toggle_visibility(&link_id, observed).await?)
        })
        .await
    }

    /// Delete a link
    pub async fn remove_link(&self, link_id: &str) -> Result<()> {
        let owner = self.session.require()?;
        let links = self.links.clone();
        let link_id = link_id.to_string();

        detached(async move {
            ensure_owner(&links, &link_id, &owner.uid).await?;
            Ok(links.remove_link(&link_id).await?)
        })
        .await
    }

    // ===== Views =====

    /// The owner's links as last delivered; `None` when signed out
    pub fn links(&self) -> Option<LiveState> {
        self.live.as_ref().map(LiveQuery::state)
    }

    /// The owner live query, for waiting on updates
    pub fn live(&self) -> Option<&LiveQuery> {
        self.live.as_ref()
    }

    /// Route of the signed-in owner's share page
    pub fn share_path(&self) -> Option<String> {
        let user = self.session.current()?;
        share_url(&self.origin, &user.uid, user.display_name_or_default())
            .ok()
            .map(|url| url.path().to_string())
    }

    /// Full share URL of the signed-in owner's page
    pub fn share_url(&self) -> Option<String> {
        let user = self.session.current()?;
        share_url(&self.origin, &user.uid, user.display_name_or_default())
            .ok()
            .map(String::from)
    }

    /// Stop following the owner's links
    pub fn close(&mut self) {
        if let Some(live) = self.live.as_mut() {
            live.close();
        }
    }
}

/// Only the owner may change or delete a link
///
/// Absent links pass, so removing them stays a no-op and toggling them
/// reports the store's missing-record error.
async fn ensure_owner(links: &LinkStore, link_id: &str, uid: &str) -> Result<()> {
    match links.get_link(link_id).await? {
        Some(link) if link.owner_id != uid => Err(StoreError::PermissionDenied(format!(
            "link '{link_id}' belongs to another user"
        ))
        .into()),
        _ => Ok(()),
    }
}

/// Run `task` to completion on its own tokio task
///
/// Dropping the returned future does not cancel the task.
async fn detached<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
}
