//! The in-memory view model. Every operation here absorbs failures: they are
//! logged, queued as a [`Notice`] for the front end, and reported as
//! `None`/`false` so the caller never has to unwind an error.

use crate::attachments::{self, ImageFile};
use crate::blob::BlobStore;
use crate::config::Settings;
use crate::errors::{Absorb, CalError, ErrorKind};
use crate::export::{ClientIdentity, ExportOptions, render_snapshot};
use crate::mirror::LocalMirror;
use crate::report::Dashboard;
use crate::storage::RemoteStore;
use crate::storage::models::{Client, ClientDraft, Post, PostDraft, PostPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct Session<S, B> {
    store: S,
    blobs: B,
    mirror: LocalMirror,
    settings: Settings,
    clients: Vec<Client>,
    selected: Option<Client>,
    posts: Vec<Post>,
    notices: Vec<Notice>,
}

fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
}

impl<S: RemoteStore, B: BlobStore> Session<S, B> {
    pub fn new(store: S, blobs: B, mirror: LocalMirror, settings: Settings) -> Self {
        Self {
            store,
            blobs,
            mirror,
            settings,
            clients: Vec::new(),
            selected: None,
            posts: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn selected(&self) -> Option<&Client> {
        self.selected.as_ref()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, id: i64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn info(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        });
    }

    fn fail(&mut self, context: &str, err: &CalError) {
        tracing::error!(kind = ?err.kind(), error = %err, "{} failed", context);
        let message = match err.kind() {
            ErrorKind::NotFound => format!("{}: not found", context),
            ErrorKind::Unauthorized => format!("{}: wrong password", context),
            ErrorKind::InvalidInput => format!("{}: {}", context, err),
            ErrorKind::Transport => format!("{}: storage unavailable ({})", context, err),
        };
        self.notices.push(Notice {
            level: NoticeLevel::Error,
            message,
        });
    }

    fn cache_posts(&self) {
        if let Some(ref client) = self.selected {
            self.mirror.cache_client_posts(&client.id, &self.posts);
        }
    }

    // --- Clients ---

    /// Loads clients from the remote store, or from the mirror when it is unreachable.
    pub fn load_clients(&mut self) -> bool {
        match self.store.fetch_clients() {
            Ok(clients) => {
                self.mirror.cache_clients(&clients);
                self.clients = clients;
                true
            }
            Err(e) => {
                self.fail("Loading clients", &e);
                if let Some(cached) = self.mirror.cached_clients() {
                    tracing::info!(count = cached.len(), "using cached clients");
                    self.clients = cached;
                }
                false
            }
        }
    }

    /// Opens a client's calendar. A supplied password must match the stored one.
    pub fn select_client(&mut self, id: &str, password: Option<&str>) -> Option<&Client> {
        match self.store.fetch_client_by_id(id, password) {
            Ok(client) => {
                self.selected = Some(client);
                self.refresh_posts();
                self.selected.as_ref()
            }
            Err(e) => {
                self.fail("Opening client", &e);
                None
            }
        }
    }

    pub fn create_client(&mut self, mut draft: ClientDraft) -> Option<Client> {
        draft.id = None;
        match self.store.save_client(&draft) {
            Ok(client) => {
                self.clients.push(client.clone());
                self.mirror.cache_clients(&self.clients);
                self.info(format!("Client \"{}\" created", client.name));
                Some(client)
            }
            Err(e) => {
                self.fail("Creating client", &e);
                None
            }
        }
    }

    pub fn update_client(&mut self, draft: ClientDraft) -> Option<Client> {
        if draft.id.is_none() {
            self.fail(
                "Updating client",
                &CalError::InvalidInput("client id is required".into()),
            );
            return None;
        }
        match self.store.save_client(&draft) {
            Ok(client) => {
                match self.clients.iter().position(|c| c.id == client.id) {
                    Some(i) => self.clients[i] = client.clone(),
                    None => self.clients.push(client.clone()),
                }
                if self.selected.as_ref().is_some_and(|s| s.id == client.id) {
                    self.selected = Some(client.clone());
                }
                self.mirror.cache_clients(&self.clients);
                self.info(format!("Client \"{}\" updated", client.name));
                Some(client)
            }
            Err(e) => {
                self.fail("Updating client", &e);
                None
            }
        }
    }

    pub fn delete_client(&mut self, id: &str) -> bool {
        match self.store.delete_client(id) {
            Ok(true) => {
                self.clients.retain(|c| c.id != id);
                self.mirror.forget_client(id);
                if self.selected.as_ref().is_some_and(|s| s.id == id) {
                    self.selected = None;
                    self.posts.clear();
                }
                self.info("Client removed");
                true
            }
            Ok(false) => {
                self.fail(
                    "Removing client",
                    &CalError::NotFound(format!("Client with id {} not found", id)),
                );
                false
            }
            Err(e) => {
                self.fail("Removing client", &e);
                false
            }
        }
    }

    // --- Posts ---

    /// Reloads the selected client's posts, falling back to the mirror.
    pub fn refresh_posts(&mut self) -> bool {
        let Some(client_id) = self.selected.as_ref().map(|c| c.id.clone()) else {
            return false;
        };
        match self.store.fetch_client_posts(&client_id) {
            Ok(posts) => {
                self.posts = posts;
                self.cache_posts();
                true
            }
            Err(e) => {
                self.fail("Loading posts", &e);
                self.posts = self.mirror.cached_client_posts(&client_id).unwrap_or_default();
                false
            }
        }
    }

    /// Creates a post for the selected client.
    pub fn create_post(&mut self, mut draft: PostDraft) -> Option<Post> {
        let Some(client_id) = self.selected.as_ref().map(|c| c.id.clone()) else {
            self.fail(
                "Creating post",
                &CalError::InvalidInput("no client selected".into()),
            );
            return None;
        };
        draft.id = None;
        draft.client_id = client_id;
        match self.store.save_post(&draft) {
            Ok(post) => {
                self.posts.push(post.clone());
                sort_posts(&mut self.posts);
                self.cache_posts();
                self.info("Post created");
                Some(post)
            }
            Err(e) => {
                self.fail("Creating post", &e);
                None
            }
        }
    }

    pub fn delete_post(&mut self, id: i64) -> bool {
        match self.store.delete_post(id) {
            Ok(true) => {
                self.posts.retain(|p| p.id != id);
                self.cache_posts();
                self.info("Post removed");
                true
            }
            Ok(false) => {
                self.fail(
                    "Removing post",
                    &CalError::NotFound(format!("Post with id {} not found", id)),
                );
                false
            }
            Err(e) => {
                self.fail("Removing post", &e);
                false
            }
        }
    }

    fn post_index(&mut self, id: i64, context: &str) -> Option<usize> {
        let index = self.posts.iter().position(|p| p.id == id);
        if index.is_none() {
            self.fail(
                context,
                &CalError::NotFound(format!("Post with id {} not loaded", id)),
            );
        }
        index
    }

    /// Applies `patch` to the in-memory post first, then persists it. A failed
    /// write puts the previous version back.
    fn apply_optimistic(&mut self, id: i64, patch: PostPatch, context: &str) -> bool {
        let Some(index) = self.post_index(id, context) else {
            return false;
        };
        let previous = self.posts[index].clone();
        self.posts[index].apply(&patch);

        match self.store.update_post(id, &patch) {
            Ok(saved) => {
                self.posts[index] = saved;
                self.cache_posts();
                true
            }
            Err(e) => {
                self.posts[index] = previous;
                self.fail(context, &e);
                false
            }
        }
    }

    /// Flips Pending/Completed and returns the new state.
    pub fn toggle_completed(&mut self, id: i64) -> Option<bool> {
        let index = self.post_index(id, "Updating post status")?;
        let completed = !self.posts[index].completed;
        let patch = PostPatch {
            completed: Some(completed),
            ..Default::default()
        };
        if !self.apply_optimistic(id, patch, "Updating post status") {
            return None;
        }
        self.info(if completed {
            "Task marked as completed"
        } else {
            "Task marked as pending"
        });
        Some(completed)
    }

    pub fn update_notes(&mut self, id: i64, notes: &str) -> bool {
        let patch = PostPatch {
            notes: Some(notes.to_string()),
            ..Default::default()
        };
        self.apply_optimistic(id, patch, "Updating post notes")
    }

    pub fn edit_post(&mut self, id: i64, title: Option<String>, text: Option<String>) -> bool {
        let patch = PostPatch {
            title,
            text,
            ..Default::default()
        };
        if patch.is_empty() {
            return true;
        }
        let saved = self.apply_optimistic(id, patch, "Saving changes");
        if saved {
            self.info("Changes saved");
        }
        saved
    }

    // --- Attachments ---

    /// Uploads `files` to a post and returns how many were attached.
    pub fn upload_images(&mut self, post_id: i64, files: &[ImageFile]) -> usize {
        let Some(index) = self.post_index(post_id, "Uploading images") else {
            return 0;
        };
        let mut post = self.posts[index].clone();
        let result = attachments::upload_images(&self.store, &self.blobs, &mut post, files);
        self.posts[index] = post;
        self.cache_posts();

        match result {
            Ok(committed) => {
                self.info(format!("{} file(s) added", committed));
                committed
            }
            Err(e) => {
                let context = format!("Uploading images (stopped after {})", e.committed);
                self.fail(&context, &e.source);
                e.committed
            }
        }
    }

    pub fn remove_image(&mut self, post_id: i64, image_index: usize) -> Option<String> {
        let index = self.post_index(post_id, "Removing image")?;
        let mut post = self.posts[index].clone();
        match attachments::remove_image(&self.store, &self.blobs, &mut post, image_index) {
            Ok(url) => {
                self.posts[index] = post;
                self.cache_posts();
                self.info("Image removed");
                Some(url)
            }
            Err(e) => {
                self.fail("Removing image", &e);
                None
            }
        }
    }

    // --- Sharing and reporting ---

    /// Renders the selected client's agenda from the mirror's `calendarPosts`.
    pub fn export_snapshot(&mut self, options: &ExportOptions) -> Option<String> {
        let Some(client) = self.selected.clone() else {
            self.fail(
                "Exporting agenda",
                &CalError::InvalidInput("no client selected".into()),
            );
            return None;
        };
        let posts = match self.mirror.cached_client_posts(&client.id) {
            Some(posts) => posts,
            None => {
                tracing::warn!(client_id = %client.id, "mirror has no posts, exporting loaded ones");
                self.posts.clone()
            }
        };
        Some(render_snapshot(&ClientIdentity::from(&client), &posts, options))
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions::today(self.settings.company_name.clone())
    }

    pub fn share_link(&self, client_id: &str) -> String {
        format!(
            "{}/client/{}",
            self.settings.share_base_url.trim_end_matches('/'),
            client_id
        )
    }

    pub fn dashboard(&mut self) -> Option<Dashboard> {
        match self.store.post_counts().absorb("Loading post counts") {
            Some(counts) => Some(Dashboard::build(&self.clients, &counts)),
            None => {
                self.notices.push(Notice {
                    level: NoticeLevel::Error,
                    message: "Loading post counts: storage unavailable".into(),
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FsBlobStore;
    use crate::test_support::{FlakyStore, PNG_BYTES};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    type TestSession = Session<FlakyStore, FsBlobStore>;

    fn session() -> (TempDir, TestSession) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::post_images(dir.path(), "https://cdn.test").unwrap();
        let mirror = LocalMirror::open(dir.path().join("mirror.json"));
        let settings = Settings {
            company_name: "Studio Norte".into(),
            share_base_url: "https://agenda.test/".into(),
            ..Default::default()
        };
        (dir, Session::new(FlakyStore::new(), blobs, mirror, settings))
    }

    fn with_client(session: &mut TestSession, password: &str) -> Client {
        let client = session
            .create_client(ClientDraft {
                password: password.into(),
                ..ClientDraft::new("Café Aurora")
            })
            .unwrap();
        session.select_client(&client.id, Some(password)).unwrap();
        client
    }

    fn draft(date: &str, text: &str) -> PostDraft {
        PostDraft {
            date: date.into(),
            day_of_week: "Segunda".into(),
            title: "Dica".into(),
            post_type: "Reels".into(),
            text: text.into(),
            ..Default::default()
        }
    }

    fn has_error(notices: &[Notice], needle: &str) -> bool {
        notices
            .iter()
            .any(|n| n.level == NoticeLevel::Error && n.message.contains(needle))
    }

    #[test]
    fn test_load_clients_caches_into_mirror() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        assert!(s.load_clients());
        assert_eq!(s.clients().len(), 1);
        assert_eq!(s.mirror().cached_clients().unwrap().len(), 1);
    }

    #[test]
    fn test_load_clients_falls_back_to_mirror() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        s.load_clients();
        s.drain_notices();

        s.store().fail("fetch_clients");
        assert!(!s.load_clients());
        assert_eq!(s.clients().len(), 1);
        assert!(has_error(&s.drain_notices(), "storage unavailable"));
    }

    #[test]
    fn test_select_client_distinguishes_failures() {
        let (_dir, mut s) = session();
        let client = with_client(&mut s, "pw");
        s.drain_notices();

        assert!(s.select_client(&client.id, Some("nope")).is_none());
        assert!(has_error(&s.drain_notices(), "wrong password"));

        assert!(s.select_client("missing", None).is_none());
        assert!(has_error(&s.drain_notices(), "not found"));
    }

    #[test]
    fn test_create_post_requires_selection() {
        let (_dir, mut s) = session();
        assert!(s.create_post(draft("2025-04-07", "x")).is_none());
        assert!(has_error(&s.drain_notices(), "no client selected"));
    }

    #[test]
    fn test_create_posts_keeps_date_order_and_mirror() {
        let (_dir, mut s) = session();
        let client = with_client(&mut s, "");
        s.create_post(draft("2025-04-09", "later")).unwrap();
        s.create_post(draft("2025-04-02", "sooner")).unwrap();
        let texts: Vec<_> = s.posts().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["sooner", "later"]);
        assert_eq!(s.mirror().cached_client_posts(&client.id).unwrap().len(), 2);
    }

    #[test]
    fn test_toggle_completed_round_trip() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        let post = s.create_post(draft("2025-04-07", "x")).unwrap();
        assert_eq!(s.toggle_completed(post.id), Some(true));
        assert!(s.store().inner().fetch_post(post.id).unwrap().completed);
        assert_eq!(s.toggle_completed(post.id), Some(false));
        assert!(!s.post(post.id).unwrap().completed);
    }

    #[test]
    fn test_failed_update_reverts_optimistic_change() {
        let (_dir, mut s) = session();
        let client = with_client(&mut s, "");
        let post = s.create_post(draft("2025-04-07", "x")).unwrap();
        s.drain_notices();

        s.store().fail("update_post");
        assert_eq!(s.toggle_completed(post.id), None);
        assert!(!s.post(post.id).unwrap().completed);
        assert!(!s.update_notes(post.id, "later"));
        assert_eq!(s.post(post.id).unwrap().notes, "");
        assert!(has_error(&s.drain_notices(), "Updating post status"));
        let cached = s.mirror().cached_client_posts(&client.id).unwrap();
        assert!(!cached[0].completed);
    }

    #[test]
    fn test_edit_post_changes_only_title_and_text() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        let post = s.create_post(draft("2025-04-07", "before")).unwrap();
        assert!(s.edit_post(post.id, None, Some("after".into())));
        let stored = s.store().inner().fetch_post(post.id).unwrap();
        assert_eq!(stored.text, "after");
        assert_eq!(stored.title, "Dica");
        assert_eq!(stored.post_type, "Reels");
    }

    #[test]
    fn test_refresh_posts_falls_back_to_mirror() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        s.create_post(draft("2025-04-07", "cached")).unwrap();
        s.store().fail("fetch_client_posts");
        assert!(!s.refresh_posts());
        assert_eq!(s.posts().len(), 1);
        assert_eq!(s.posts()[0].text, "cached");
    }

    #[test]
    fn test_upload_and_remove_images() {
        let (_dir, mut s) = session();
        let client = with_client(&mut s, "");
        let post = s.create_post(draft("2025-04-07", "x")).unwrap();
        let files = [
            ImageFile::new("a.png", PNG_BYTES.to_vec()),
            ImageFile::new("b.png", PNG_BYTES.to_vec()),
        ];
        assert_eq!(s.upload_images(post.id, &files), 2);
        let images = s.post(post.id).unwrap().images.clone();
        assert_eq!(images.len(), 2);

        assert_eq!(s.remove_image(post.id, 0), Some(images[0].clone()));
        assert_eq!(s.post(post.id).unwrap().images, vec![images[1].clone()]);
        let cached = s.mirror().cached_client_posts(&client.id).unwrap();
        assert_eq!(cached[0].images, vec![images[1].clone()]);
    }

    #[test]
    fn test_partial_upload_reports_committed() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        let post = s.create_post(draft("2025-04-07", "x")).unwrap();
        let files = [
            ImageFile::new("a.png", PNG_BYTES.to_vec()),
            ImageFile::new("b.txt", b"nope".to_vec()),
        ];
        assert_eq!(s.upload_images(post.id, &files), 1);
        assert_eq!(s.post(post.id).unwrap().images.len(), 1);
        assert!(has_error(&s.drain_notices(), "stopped after 1"));
    }

    #[test]
    fn test_delete_client_clears_selection_and_mirror() {
        let (_dir, mut s) = session();
        let client = with_client(&mut s, "");
        s.create_post(draft("2025-04-07", "x")).unwrap();
        assert!(s.delete_client(&client.id));
        assert!(s.selected().is_none());
        assert!(s.posts().is_empty());
        assert!(s.mirror().cached_client_posts(&client.id).unwrap().is_empty());
        assert!(!s.delete_client(&client.id));
    }

    fn export_options() -> ExportOptions {
        ExportOptions {
            company_name: "Studio Norte".into(),
            generated_on: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
        }
    }

    #[test]
    fn test_export_reads_mirror() {
        let (_dir, mut s) = session();
        let client = with_client(&mut s, "");
        let post = s.create_post(draft("2025-04-07", "Promoção de outono")).unwrap();

        let mut cached = post.clone();
        cached.text = "Versão do espelho".into();
        s.mirror().cache_client_posts(&client.id, &[cached]);

        let html = s.export_snapshot(&export_options()).unwrap();
        assert!(html.contains("Versão do espelho"));
        assert!(!html.contains("Promoção de outono"));
        assert!(html.contains("<h2>Café Aurora</h2>"));
    }

    #[test]
    fn test_export_without_mirror_uses_loaded_posts() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        s.create_post(draft("2025-04-07", "Promoção de outono")).unwrap();
        s.mirror().remove(crate::mirror::POSTS_KEY);
        assert!(s.mirror().cached_client_posts("anyone").is_none());

        let html = s.export_snapshot(&export_options()).unwrap();
        assert!(html.contains("Promoção de outono"));
    }

    #[test]
    fn test_share_link() {
        let (_dir, s) = session();
        assert_eq!(s.share_link("abc"), "https://agenda.test/client/abc");
    }

    #[test]
    fn test_dashboard() {
        let (_dir, mut s) = session();
        with_client(&mut s, "");
        s.create_post(draft("2025-04-07", "x")).unwrap();
        s.load_clients();
        let dash = s.dashboard().unwrap();
        assert_eq!(dash.total_posts, 1);
        assert_eq!(dash.active_clients, 1);

        s.store().fail("post_counts");
        assert!(s.dashboard().is_none());
        s.store().heal();
        assert!(s.dashboard().is_some());
    }
}
