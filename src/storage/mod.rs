pub mod models;
pub mod schema;
pub mod sqlite;

use crate::errors::Result;
use models::{Client, ClientDraft, Post, PostDraft, PostImage, PostPatch};

/// The relational backend holding the `clients`, `posts` and `post_images` tables.
pub trait RemoteStore {
    fn fetch_clients(&self) -> Result<Vec<Client>>;
    fn fetch_client_by_id(&self, id: &str, password: Option<&str>) -> Result<Client>;
    fn save_client(&self, client: &ClientDraft) -> Result<Client>;
    fn delete_client(&self, id: &str) -> Result<bool>;
    fn fetch_client_posts(&self, client_id: &str) -> Result<Vec<Post>>;
    fn fetch_post(&self, id: i64) -> Result<Post>;
    fn save_post(&self, post: &PostDraft) -> Result<Post>;
    fn update_post(&self, id: i64, patch: &PostPatch) -> Result<Post>;
    fn delete_post(&self, id: i64) -> Result<bool>;
    fn insert_post_image(&self, post_id: i64, url: &str) -> Result<PostImage>;
    fn find_post_image(&self, post_id: i64, url: &str) -> Result<Option<PostImage>>;
    fn delete_post_image(&self, id: i64) -> Result<bool>;
    fn list_post_images(&self, post_id: i64) -> Result<Vec<PostImage>>;
    fn post_counts(&self) -> Result<Vec<(String, i64)>>;
}
