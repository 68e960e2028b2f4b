//! Sharing view controller
//!
//! Backs the visitor-facing page for one user's public links. A view is
//! opened from the `(user_id, user_name)` pair in the share route and
//! combines three things:
//!
//! - a best-effort profile image; any blob failure degrades to
//!   [`ProfileImage::ImageUnavailable`]
//! - the public-scoped live query for `user_id`
//! - the copy-share-link affordance with its self-resetting confirmation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::blob::{profile_picture_path, BlobStoreRef};
use crate::config::Config;
use crate::error::{ClipboardError, SnapLinkError, ValidationError};
use crate::links::LinkStore;
use crate::live::{LiveQuery, ReconnectPolicy, Scope};
use crate::models::Link;

/// First path segment of every share route
pub const SHARE_ROUTE: &str = "shared-links";

/// Build the canonical share URL `<origin>/shared-links/<user_id>/<user_name>`
///
/// Both segments are percent-encoded.
pub fn share_url(origin: &str, user_id: &str, user_name: &str) -> Result<Url, ValidationError> {
    let mut url =
        Url::parse(origin).map_err(|_| ValidationError::Malformed(origin.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ValidationError::Malformed(origin.to_string()))?
        .pop_if_empty()
        .extend([SHARE_ROUTE, user_id, user_name]);
    Ok(url)
}

/// Destination for copied text
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The owner's picture, or the named degraded state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileImage {
    Resolved(String),
    ImageUnavailable,
}

impl ProfileImage {
    /// The URL to render, substituting `placeholder` when unavailable
    pub fn url_or<'a>(&'a self, placeholder: &'a str) -> &'a str {
        match self {
            ProfileImage::Resolved(url) => url,
            ProfileImage::ImageUnavailable => placeholder,
        }
    }
}

/// What the shared-links list shows
#[derive(Debug, Clone, PartialEq)]
pub enum SharedLinksState {
    /// No snapshot has arrived yet
    Loading,
    /// Arrived, and the user has no public links
    Empty,
    /// Public links in store order
    Populated(Vec<Link>),
}

/// Settings a sharing view needs from the configuration
#[derive(Debug, Clone)]
pub struct SharingOptions {
    pub origin: String,
    pub copy_reset_delay: Duration,
    pub placeholder_image_url: String,
    pub reconnect: ReconnectPolicy,
}

impl SharingOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin: config.origin.clone(),
            copy_reset_delay: config.copy_reset_delay(),
            placeholder_image_url: config.placeholder_image_url.clone(),
            reconnect: ReconnectPolicy::from_config(config),
        }
    }
}

impl Default for SharingOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Read-only view of one user's public links
pub struct SharingView {
    user_id: String,
    user_name: String,
    share_url: String,
    image: ProfileImage,
    placeholder_image_url: String,
    live: LiveQuery,
    copied: Arc<CopyFlag>,
    copy_reset_delay: Duration,
    reset_timer: Option<JoinHandle<()>>,
}

impl SharingView {
    /// Open the view for `(user_id, user_name)`
    ///
    /// Only an unusable origin fails; the profile image is best effort.
    pub async fn open(
        links: &LinkStore,
        blobs: &BlobStoreRef,
        options: SharingOptions,
        user_id: &str,
        user_name: &str,
    ) -> Result<Self, ValidationError> {
        let share_url = share_url(&options.origin, user_id, user_name)?.to_string();
        let image = resolve_image(blobs, user_id).await;
        let live = links.watch(Scope::Public(user_id.to_string()), options.reconnect);

        debug!(user_id, user_name, "Opened sharing view");
        Ok(Self {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            share_url,
            image,
            placeholder_image_url: options.placeholder_image_url,
            live,
            copied: Arc::new(CopyFlag::new()),
            copy_reset_delay: options.copy_reset_delay,
            reset_timer: None,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn share_url(&self) -> &str {
        &self.share_url
    }

    pub fn profile_image(&self) -> &ProfileImage {
        &self.image
    }

    /// The image URL to render, placeholder included
    pub fn image_url(&self) -> &str {
        self.image.url_or(&self.placeholder_image_url)
    }

    /// Exactly one of loading, empty or populated
    pub fn state(&self) -> SharedLinksState {
        shared_state(self.live.state().links)
    }

    /// The public live query, for waiting on updates
    pub fn live(&self) -> &LiveQuery {
        &self.live
    }

    /// Copy the share URL and raise the confirmation flag
    ///
    /// The flag drops back after the reset delay, measured from the most
    /// recent successful copy. A clipboard failure leaves the flag alone.
    pub async fn copy_share_link(&mut self, clipboard: &dyn Clipboard) -> Result<(), ClipboardError> {
        clipboard.write_text(&self.share_url).await?;

        if let Some(timer) = self.reset_timer.take() {
            timer.abort();
        }
        let generation = self.copied.raise();

        let copied = Arc::clone(&self.copied);
        let delay = self.copy_reset_delay;
        self.reset_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            copied.reset(generation);
        }));
        Ok(())
    }

    /// Whether the copy confirmation is showing
    pub fn copied(&self) -> bool {
        *self.copied.flag.borrow()
    }

    pub fn on_copied(&self) -> watch::Receiver<bool> {
        self.copied.flag.subscribe()
    }

    /// Release the subscription and cancel a pending reset
    pub fn close(&mut self) {
        self.live.close();
        if let Some(timer) = self.reset_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for SharingView {
    fn drop(&mut self) {
        self.close();
    }
}

/// The copy confirmation flag and the generation of the copy that raised it
///
/// A reset only lands if no copy happened since the timer was armed, even
/// when an aborted timer task was already past its sleep.
struct CopyFlag {
    flag: watch::Sender<bool>,
    generation: AtomicU64,
}

impl CopyFlag {
    fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag,
            generation: AtomicU64::new(0),
        }
    }

    /// Raise the flag and return the new generation
    fn raise(&self) -> u64 {
        let mut generation = 0;
        self.flag.send_modify(|copied| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *copied = true;
        });
        generation
    }

    /// Drop the flag if `generation` is still the latest copy
    fn reset(&self, generation: u64) -> bool {
        self.flag.send_if_modified(|copied| {
            if self.generation.load(Ordering::SeqCst) != generation || !*copied {
                return false;
            }
            *copied = false;
            true
        })
    }
}

fn shared_state(links: Option<Vec<Link>>) -> SharedLinksState {
    match links {
        None => SharedLinksState::Loading,
        Some(links) if links.is_empty() => SharedLinksState::Empty,
        Some(links) => SharedLinksState::Populated(links),
    }
}

async fn resolve_image(blobs: &BlobStoreRef, user_id: &str) -> ProfileImage {
    match blobs.resolve_url(&profile_picture_path(user_id)).await {
        Ok(url) => ProfileImage::Resolved(url),
        Err(SnapLinkError::NotFound(e)) => {
            debug!(user_id, error = %e, "No profile picture");
            ProfileImage::ImageUnavailable
        }
        Err(e) => {
            warn!(user_id, error = %e, "Profile picture lookup failed");
            ProfileImage::ImageUnavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobStore;
    use crate::document::{DocumentStore, MemoryDocumentStore};
    use crate::error::StoreError;
    use crate::models::LinkRecord;
    use std::sync::Mutex;

    /// Clipboard that records what was written, or refuses every write
    #[derive(Default)]
    struct RecordingClipboard {
        written: Mutex<Vec<String>>,
        refuse: bool,
    }

    #[async_trait]
    impl Clipboard for RecordingClipboard {
        async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            if self.refuse {
                return Err(ClipboardError("denied".to_string()));
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    /// Blob store that either has one picture or always fails
    struct StubBlobs {
        url: Option<String>,
        broken: bool,
    }

    #[async_trait]
    impl BlobStore for StubBlobs {
        async fn put(&self, _path: &str, _bytes: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn resolve_url(&self, path: &str) -> Result<String, SnapLinkError> {
            if self.broken {
                return Err(StoreError::Unavailable("blob service down".to_string()).into());
            }
            self.url.clone().ok_or_else(|| {
                crate::error::NotFoundError {
                    path: path.to_string(),
                }
                .into()
            })
        }
    }

    fn blobs(url: Option<&str>, broken: bool) -> BlobStoreRef {
        Arc::new(StubBlobs {
            url: url.map(str::to_string),
            broken,
        })
    }

    fn options() -> SharingOptions {
        SharingOptions {
            origin: "http://localhost:3000".to_string(),
            copy_reset_delay: Duration::from_secs(2),
            placeholder_image_url: "https://placeholder.test/150".to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    async fn open(documents: &Arc<MemoryDocumentStore>, blobs: &BlobStoreRef) -> SharingView {
        let links = LinkStore::new(documents.clone(), "links");
        SharingView::open(&links, blobs, options(), "u1", "Ada Lovelace")
            .await
            .unwrap()
    }

    #[test]
    fn test_share_url_encodes_segments() {
        let url = share_url("http://localhost:3000", "u1", "Ada Lovelace").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/shared-links/u1/Ada%20Lovelace"
        );

        let url = share_url("https://snap.example/", "a/b", "x?y").unwrap();
        assert_eq!(url.as_str(), "https://snap.example/shared-links/a%2Fb/x%3Fy");

        assert!(share_url("not an origin", "u1", "Ada").is_err());
    }

    #[test]
    fn test_shared_state_is_exclusive() {
        assert_eq!(shared_state(None), SharedLinksState::Loading);
        assert_eq!(shared_state(Some(Vec::new())), SharedLinksState::Empty);
    }

    #[tokio::test]
    async fn test_image_states() {
        let documents = Arc::new(MemoryDocumentStore::new());

        let view = open(&documents, &blobs(Some("file:///pics/u1"), false)).await;
        assert_eq!(
            view.profile_image(),
            &ProfileImage::Resolved("file:///pics/u1".to_string())
        );
        assert_eq!(view.image_url(), "file:///pics/u1");

        let view = open(&documents, &blobs(None, false)).await;
        assert_eq!(view.profile_image(), &ProfileImage::ImageUnavailable);
        assert_eq!(view.image_url(), "https://placeholder.test/150");

        let view = open(&documents, &blobs(None, true)).await;
        assert_eq!(view.profile_image(), &ProfileImage::ImageUnavailable);
    }

    #[tokio::test]
    async fn test_only_public_links_are_shown() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let mut public = LinkRecord::new("u1", "https://public.com");
        public.is_public = true;
        let mut foreign = LinkRecord::new("u2", "https://foreign.com");
        foreign.is_public = true;
        documents.insert("links", public.into_fields()).await.unwrap();
        documents.insert("links", foreign.into_fields()).await.unwrap();
        documents
            .insert("links", LinkRecord::new("u1", "https://private.com").into_fields())
            .await
            .unwrap();

        let view = open(&documents, &blobs(None, false)).await;
        view.live().wait_for(|s| !s.is_loading()).await.unwrap();

        match view.state() {
            SharedLinksState::Populated(links) => {
                let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
                assert_eq!(urls, vec!["https://public.com"]);
            }
            other => panic!("expected populated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_state() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let view = open(&documents, &blobs(None, false)).await;
        view.live().wait_for(|s| !s.is_loading()).await.unwrap();
        assert_eq!(view.state(), SharedLinksState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_confirmation_resets() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let mut view = open(&documents, &blobs(None, false)).await;
        let clipboard = RecordingClipboard::default();

        view.copy_share_link(&clipboard).await.unwrap();
        assert!(view.copied());
        assert_eq!(
            clipboard.written.lock().unwrap().as_slice(),
            ["http://localhost:3000/shared-links/u1/Ada%20Lovelace"]
        );

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(view.copied());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!view.copied());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_copies_reset_once_from_last() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let documents = Arc::new(MemoryDocumentStore::new());
        let mut view = open(&documents, &blobs(None, false)).await;
        let clipboard = RecordingClipboard::default();

        let resets = Arc::new(AtomicUsize::new(0));
        let mut flag = view.on_copied();
        let counter = resets.clone();
        tokio::spawn(async move {
            while flag.changed().await.is_ok() {
                if !*flag.borrow_and_update() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        // Copies at 0ms, 500ms and 1000ms
        for _ in 0..3 {
            view.copy_share_link(&clipboard).await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        // 2.5s after the first copy the flag is still up
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(view.copied());
        assert_eq!(resets.load(Ordering::SeqCst), 0);

        // 2s after the last copy it drops, once
        tokio::time::sleep(Duration::from_millis(501)).await;
        assert!(!view.copied());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(clipboard.written.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_stale_reset_is_ignored() {
        let flag = CopyFlag::new();
        let first = flag.raise();
        let second = flag.raise();

        // The first timer fires after the second copy
        assert!(!flag.reset(first));
        assert!(*flag.flag.borrow());

        assert!(flag.reset(second));
        assert!(!*flag.flag.borrow());
        assert!(!flag.reset(second));
    }

    #[tokio::test]
    async fn test_clipboard_failure_leaves_flag_down() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let mut view = open(&documents, &blobs(None, false)).await;
        let clipboard = RecordingClipboard {
            refuse: true,
            ..Default::default()
        };

        let err = view.copy_share_link(&clipboard).await.unwrap_err();
        assert_eq!(err, ClipboardError("denied".to_string()));
        assert!(!view.copied());
    }
}
