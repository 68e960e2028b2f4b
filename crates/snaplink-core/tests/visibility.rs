//! End-to-end visibility scenarios: owner commits and toggles links, a
//! visitor's sharing view follows the public subset.

use std::sync::Arc;
use std::time::Duration;

use snaplink_core::validation::SignUpForm;
use snaplink_core::{
    BlobStoreRef, DocumentStoreRef, FsBlobStore, LinkStore, LocalIdentityProvider,
    ManagementController, MemoryDocumentStore, ReconnectPolicy, Scope, Session, SharedLinksState,
    SharingOptions, SharingView, SqliteDocumentStore, ToggleOutcome, ValidationError,
};
use tempfile::TempDir;

struct World {
    _temp_dir: TempDir,
    session: Session,
    links: LinkStore,
    blobs: BlobStoreRef,
}

impl World {
    fn new(documents: DocumentStoreRef) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let blobs: BlobStoreRef = Arc::new(FsBlobStore::with_root(temp_dir.path().join("blobs")));
        Self {
            session: Session::new(Arc::new(LocalIdentityProvider::open_in_memory().unwrap())),
            links: LinkStore::new(documents, "links"),
            blobs,
            _temp_dir: temp_dir,
        }
    }

    fn memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()))
    }

    async fn sign_up(&self, name: &str) -> String {
        self.session
            .sign_up(&SignUpForm {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password: "hunter22".to_string(),
                confirm_password: "hunter22".to_string(),
            })
            .await
            .unwrap()
            .uid
    }

    fn manage(&self) -> ManagementController {
        ManagementController::new(
            self.session.clone(),
            self.links.clone(),
            "http://localhost:3000",
            ReconnectPolicy::default(),
        )
    }

    async fn share(&self, uid: &str, name: &str) -> SharingView {
        SharingView::open(&self.links, &self.blobs, SharingOptions::default(), uid, name)
            .await
            .unwrap()
    }
}

async fn commit(controller: &mut ManagementController, urls: &[&str]) -> Vec<String> {
    for (index, url) in urls.iter().enumerate() {
        if index > 0 {
            controller.add_entry();
        }
        controller.edit_entry(index, *url);
    }
    controller
        .commit()
        .await
        .persisted
        .into_iter()
        .map(|link| link.id)
        .collect()
}

#[tokio::test]
async fn test_mixed_batch_commits_valid_entries_only() {
    let world = World::memory();
    world.sign_up("Ada").await;
    let mut manage = world.manage();

    let ids = commit(&mut manage, &["https://a.com", "notaurl", "https://b.com"]).await;

    assert_eq!(ids.len(), 2);
    assert_eq!(manage.pending(), vec!["notaurl"]);
    assert!(matches!(
        manage.entry_error(0),
        Some(ValidationError::Malformed(_))
    ));

    let state = manage
        .live()
        .unwrap()
        .wait_for(|s| s.links().len() == 2)
        .await
        .unwrap();
    let urls: Vec<_> = state.links().iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls, vec!["https://a.com", "https://b.com"]);
    assert!(state.links().iter().all(|l| !l.is_public));
}

#[tokio::test]
async fn test_toggle_to_public_reaches_sharing_view() {
    let world = World::memory();
    let uid = world.sign_up("Ada").await;
    let mut manage = world.manage();
    let ids = commit(&mut manage, &["https://a.com", "https://b.com"]).await;

    let view = world.share(&uid, "Ada").await;
    view.live().wait_for(|s| !s.is_loading()).await.unwrap();
    assert_eq!(view.state(), SharedLinksState::Empty);

    let outcome = manage.toggle_visibility(&ids[1], false).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Applied { is_public: true });

    view.live()
        .wait_for(|s| s.links().iter().any(|l| l.id == ids[1]))
        .await
        .unwrap();
    match view.state() {
        SharedLinksState::Populated(links) => {
            assert_eq!(links.len(), 1);
            assert_eq!(links[0].url, "https://b.com");
        }
        other => panic!("expected populated, got {other:?}"),
    }

    // Back to private: the public view empties again
    manage.toggle_visibility(&ids[1], true).await.unwrap();
    view.live()
        .wait_for(|s| !s.is_loading() && s.links().is_empty())
        .await
        .unwrap();
    assert_eq!(view.state(), SharedLinksState::Empty);
}

#[tokio::test]
async fn test_public_view_never_shows_private_or_foreign_links() {
    let world = World::memory();
    let ada = world.sign_up("Ada").await;
    let mut ada_manage = world.manage();
    let ada_ids = commit(
        &mut ada_manage,
        &["https://ada-public.com", "https://ada-private.com"],
    )
    .await;
    ada_manage.toggle_visibility(&ada_ids[0], false).await.unwrap();

    world.sign_up("Bob").await;
    let mut bob_manage = world.manage();
    let bob_ids = commit(&mut bob_manage, &["https://bob-public.com"]).await;
    bob_manage.toggle_visibility(&bob_ids[0], false).await.unwrap();

    let view = world.share(&ada, "Ada").await;
    let mut states = view.live().watch();
    let state = states
        .wait_for(|s| !s.links().is_empty())
        .await
        .unwrap()
        .clone();

    for link in state.links() {
        assert!(link.is_public);
        assert_eq!(link.owner_id, ada);
    }
    assert_eq!(state.links().len(), 1);
    assert_eq!(state.links()[0].id, ada_ids[0]);
}

#[tokio::test]
async fn test_removed_link_never_reappears() {
    let world = World::memory();
    let uid = world.sign_up("Ada").await;
    let mut manage = world.manage();
    let ids = commit(&mut manage, &["https://a.com", "https://b.com"]).await;

    manage.remove_link(&ids[0]).await.unwrap();
    let owner = world
        .links
        .watch(Scope::Owner(uid), ReconnectPolicy::default());

    let state = owner.wait_for(|s| !s.is_loading()).await.unwrap();
    assert!(state.links().iter().all(|l| l.id != ids[0]));

    // Later writes deliver new snapshots; none of them carries the id
    manage.toggle_visibility(&ids[1], false).await.unwrap();
    let state = owner
        .wait_for(|s| s.links().iter().any(|l| l.is_public))
        .await
        .unwrap();
    assert!(state.links().iter().all(|l| l.id != ids[0]));
}

#[tokio::test]
async fn test_stale_toggle_from_second_view_is_superseded() {
    let world = World::memory();
    world.sign_up("Ada").await;
    let mut first = world.manage();
    let second = world.manage();
    let ids = commit(&mut first, &["https://a.com"]).await;

    // Both views rendered the link as private
    first.toggle_visibility(&ids[0], false).await.unwrap();
    let outcome = second.toggle_visibility(&ids[0], false).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Superseded { current: true });

    let link = world.links.get_link(&ids[0]).await.unwrap().unwrap();
    assert!(link.is_public);
}

#[tokio::test]
async fn test_sqlite_backed_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let documents =
        Arc::new(SqliteDocumentStore::open_path(&temp_dir.path().join("snaplink.db")).unwrap());
    let world = World::new(documents.clone());
    let uid = world.sign_up("Ada").await;

    let mut manage = world.manage();
    let ids = commit(&mut manage, &["https://a.com"]).await;
    assert!(world.links.flip_visibility(&ids[0]).await.unwrap());

    let view = world.share(&uid, "Ada").await;
    view.live().wait_for(|s| s.links().len() == 1).await.unwrap();
    assert_eq!(
        view.share_url(),
        format!("http://localhost:3000/shared-links/{uid}/Ada")
    );

    drop(view);
    drop(manage);
    for _ in 0..10 {
        if documents.active_subscriptions() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(documents.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_owner_view_follows_writes_from_another_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("snaplink.db");
    let viewer = SqliteDocumentStore::open_path(&path)
        .unwrap()
        .with_poll_interval(Duration::from_millis(20));
    let writer = SqliteDocumentStore::open_path(&path).unwrap();

    let owner = LinkStore::new(Arc::new(viewer), "links")
        .watch(Scope::Owner("u1".to_string()), ReconnectPolicy::default());
    owner.wait_for(|s| !s.is_loading()).await.unwrap();

    let outcomes = LinkStore::new(Arc::new(writer), "links")
        .add_links("u1", ["https://a.com"])
        .await;
    assert!(outcomes[0].is_persisted());

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        owner.wait_for(|s| s.links().len() == 1),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(state.links()[0].url, "https://a.com");
}
