//! Link store
//!
//! CRUD over link records. Persistence is delegated to a
//! [`DocumentStore`](crate::document::DocumentStore); this layer owns
//! validation, the record shape and the visibility compare-and-set.

use serde_json::Value;
use tracing::{debug, info};

use crate::document::{CasOutcome, DocumentStoreRef, Fields};
use crate::error::{StoreError, ValidationError};
use crate::live::{LiveQuery, ReconnectPolicy, Scope};
use crate::models::{fields, Link, LinkRecord};
use crate::validation::validate_link;

/// Attempts `flip_visibility` makes before giving up on a contended record
const MAX_FLIP_ATTEMPTS: usize = 3;

/// What happened to one candidate of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    /// Stored as a new private link
    Persisted(Link),
    /// Failed validation; nothing was written
    Rejected(ValidationError),
    /// Valid, but the store call failed
    Failed(StoreError),
}

impl CandidateOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, CandidateOutcome::Persisted(_))
    }
}

/// Result of a guarded visibility toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The flag now holds `is_public`
    Applied { is_public: bool },
    /// The stored flag no longer matched what the caller observed, so
    /// nothing was written; `current` is the stored value
    Superseded { current: bool },
}

/// Link records of one collection
#[derive(Clone)]
pub struct LinkStore {
    documents: DocumentStoreRef,
    collection: String,
}

impl LinkStore {
    pub fn new(documents: DocumentStoreRef, collection: impl Into<String>) -> Self {
        Self {
            documents,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn documents(&self) -> &DocumentStoreRef {
        &self.documents
    }

    /// Start a live query over this collection
    pub fn watch(&self, scope: Scope, policy: ReconnectPolicy) -> LiveQuery {
        LiveQuery::start(self.documents.clone(), self.collection.clone(), scope, policy)
    }

    /// Validate and persist a batch of candidate URLs for `owner_id`
    ///
    /// Candidates are handled independently and the returned outcomes line
    /// up with the input order. One failing candidate never affects the
    /// others.
    pub async fn add_links<I, S>(&self, owner_id: &str, candidates: I) -> Vec<CandidateOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcomes = Vec::new();

        for candidate in candidates {
            let url = match validate_link(candidate.as_ref()) {
                Ok(url) => url,
                Err(e) => {
                    debug!(candidate = candidate.as_ref(), error = %e, "Rejected candidate");
                    outcomes.push(CandidateOutcome::Rejected(e));
                    continue;
                }
            };

            let record = LinkRecord::new(owner_id, url);
            let created_at = record.date_added;
            let outcome = match self
                .documents
                .insert(&self.collection, record.clone().into_fields())
                .await
            {
                Ok(id) => {
                    info!(%id, url = %record.link, "Added link");
                    CandidateOutcome::Persisted(Link {
                        id,
                        owner_id: record.user_id,
                        url: record.link,
                        is_public: record.is_public,
                        created_at,
                    })
                }
                Err(e) => CandidateOutcome::Failed(e),
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Set `is_public` to `!observed_is_public`, guarded by the observed value
    pub async fn toggle_visibility(
        &self,
        link_id: &str,
        observed_is_public: bool,
    ) -> Result<ToggleOutcome, StoreError> {
        let target = !observed_is_public;
        let mut outcome = self
            .documents
            .compare_and_update(
                &self.collection,
                link_id,
                visibility(observed_is_public),
                visibility(target),
            )
            .await?;

        // A record without the flag decodes as private
        let flag_unset = matches!(
            &outcome,
            CasOutcome::Conflict { current } if !current.contains_key(fields::IS_PUBLIC)
        );
        if flag_unset && !observed_is_public {
            outcome = self
                .documents
                .compare_and_update(
                    &self.collection,
                    link_id,
                    unset_visibility(),
                    visibility(target),
                )
                .await?;
        }

        match outcome {
            CasOutcome::Applied => {
                info!(id = link_id, is_public = target, "Toggled visibility");
                Ok(ToggleOutcome::Applied { is_public: target })
            }
            CasOutcome::Conflict { current } => {
                let current = stored_visibility(&current);
                debug!(id = link_id, current, "Toggle superseded by a newer value");
                Ok(ToggleOutcome::Superseded { current })
            }
        }
    }

    /// Atomically negate the stored visibility and return the new value
    ///
    /// Retries when another writer changes the flag between the read and
    /// the write, up to a small bound.
    pub async fn flip_visibility(&self, link_id: &str) -> Result<bool, StoreError> {
        for attempt in 1..=MAX_FLIP_ATTEMPTS {
            let doc = self
                .documents
                .get(&self.collection, link_id)
                .await?
                .ok_or_else(|| StoreError::MissingRecord {
                    collection: self.collection.clone(),
                    id: link_id.to_string(),
                })?;

            let raw = doc
                .fields
                .get(fields::IS_PUBLIC)
                .cloned()
                .unwrap_or(Value::Null);
            let target = !raw.as_bool().unwrap_or(false);

            let mut expected = Fields::new();
            expected.insert(fields::IS_PUBLIC.to_string(), raw);

            match self
                .documents
                .compare_and_update(&self.collection, link_id, expected, visibility(target))
                .await?
            {
                CasOutcome::Applied => {
                    info!(id = link_id, is_public = target, "Flipped visibility");
                    return Ok(target);
                }
                CasOutcome::Conflict { .. } => {
                    debug!(id = link_id, attempt, "Visibility changed underneath flip");
                }
            }
        }

        Err(StoreError::Unavailable(format!(
            "link '{link_id}' kept changing while its visibility was being flipped"
        )))
    }

    /// Delete a link; removing an absent link is a no-op
    pub async fn remove_link(&self, link_id: &str) -> Result<(), StoreError> {
        self.documents.delete(&self.collection, link_id).await?;
        info!(id = link_id, "Removed link");
        Ok(())
    }

    pub async fn get_link(&self, link_id: &str) -> Result<Option<Link>, StoreError> {
        self.documents
            .get(&self.collection, link_id)
            .await?
            .map(|doc| Link::from_document(&doc))
            .transpose()
    }
}

fn visibility(is_public: bool) -> Fields {
    let mut patch = Fields::new();
    patch.insert(fields::IS_PUBLIC.to_string(), Value::Bool(is_public));
    patch
}

/// Expectation that the record carries no visibility flag
fn unset_visibility() -> Fields {
    let mut expected = Fields::new();
    expected.insert(fields::IS_PUBLIC.to_string(), Value::Null);
    expected
}

fn stored_visibility(stored: &Fields) -> bool {
    stored
        .get(fields::IS_PUBLIC)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
