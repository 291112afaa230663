use std::cell::RefCell;
use std::collections::HashSet;

use crate::errors::{CalError, Result};
use crate::storage::RemoteStore;
use crate::storage::models::{Client, ClientDraft, Post, PostDraft, PostImage, PostPatch};
use crate::storage::sqlite::SqliteStore;

/// Smallest valid PNG signature plus IHDR start, enough for format sniffing.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// In-memory store whose operations can be switched to fail by name.
pub struct FlakyStore {
    inner: SqliteStore,
    failing: RefCell<HashSet<&'static str>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
            failing: RefCell::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.borrow_mut().insert(op);
    }

    pub fn heal(&self) {
        self.failing.borrow_mut().clear();
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failing.borrow().contains(op) {
            return Err(CalError::Storage(rusqlite::Error::InvalidQuery));
        }
        Ok(())
    }
}

impl RemoteStore for FlakyStore {
    fn fetch_clients(&self) -> Result<Vec<Client>> {
        self.check("fetch_clients")?;
        self.inner.fetch_clients()
    }

    fn fetch_client_by_id(&self, id: &str, password: Option<&str>) -> Result<Client> {
        self.check("fetch_client_by_id")?;
        self.inner.fetch_client_by_id(id, password)
    }

    fn save_client(&self, client: &ClientDraft) -> Result<Client> {
        self.check("save_client")?;
        self.inner.save_client(client)
    }

    fn delete_client(&self, id: &str) -> Result<bool> {
        self.check("delete_client")?;
        self.inner.delete_client(id)
    }

    fn fetch_client_posts(&self, client_id: &str) -> Result<Vec<Post>> {
        self.check("fetch_client_posts")?;
        self.inner.fetch_client_posts(client_id)
    }

    fn fetch_post(&self, id: i64) -> Result<Post> {
        self.check("fetch_post")?;
        self.inner.fetch_post(id)
    }

    fn save_post(&self, post: &PostDraft) -> Result<Post> {
        self.check("save_post")?;
        self.inner.save_post(post)
    }

    fn update_post(&self, id: i64, patch: &PostPatch) -> Result<Post> {
        self.check("update_post")?;
        self.inner.update_post(id, patch)
    }

    fn delete_post(&self, id: i64) -> Result<bool> {
        self.check("delete_post")?;
        self.inner.delete_post(id)
    }

    fn insert_post_image(&self, post_id: i64, url: &str) -> Result<PostImage> {
        self.check("insert_post_image")?;
        self.inner.insert_post_image(post_id, url)
    }

    fn find_post_image(&self, post_id: i64, url: &str) -> Result<Option<PostImage>> {
        self.check("find_post_image")?;
        self.inner.find_post_image(post_id, url)
    }

    fn delete_post_image(&self, id: i64) -> Result<bool> {
        self.check("delete_post_image")?;
        self.inner.delete_post_image(id)
    }

    fn list_post_images(&self, post_id: i64) -> Result<Vec<PostImage>> {
        self.check("list_post_images")?;
        self.inner.list_post_images(post_id)
    }

    fn post_counts(&self) -> Result<Vec<(String, i64)>> {
        self.check("post_counts")?;
        self.inner.post_counts()
    }
}

pub fn seeded_client(store: &impl RemoteStore) -> Client {
    store.save_client(&ClientDraft::new("Café Aurora")).unwrap()
}

/// A client with one imageless post.
pub fn seeded_post(store: &impl RemoteStore) -> Post {
    let client = seeded_client(store);
    store
        .save_post(&PostDraft {
            client_id: client.id,
            date: "2025-04-07".into(),
            day: "07".into(),
            day_of_week: "Segunda".into(),
            title: "Menu da semana".into(),
            post_type: "Carrossel".into(),
            text: "Novidades no cardápio".into(),
            ..Default::default()
        })
        .unwrap()
}
