//! Local mirror: a JSON key-value file caching what the remote store last
//! returned. It is only written after remote operations, never edited on its
//! own. It can lag the remote store, and it can also hold a post's image list
//! that the store never saved when removing an image fails to persist the
//! shortened list.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::{CalError, Result};
use crate::storage::models::{Client, Post};

pub const CLIENTS_KEY: &str = "clients";
pub const POSTS_KEY: &str = "calendarPosts";

pub struct LocalMirror {
    path: PathBuf,
}

impl LocalMirror {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => match serde_json::from_str(&raw)? {
                Value::Object(map) => Ok(map),
                _ => Err(CalError::InvalidInput(format!(
                    "{} is not a JSON object",
                    self.path.display()
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(CalError::Io(e)),
        }
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut map = self.read_all()?;
        match map.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn try_set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut map = self.read_all().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding unreadable mirror");
            Map::new()
        });
        map.insert(key.to_string(), serde_json::to_value(value)?);
        self.write_all(&map)
    }

    /// `None` when the key is missing or its value cannot be read.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, error = %e, "error reading mirror entry");
                None
            }
        }
    }

    /// Returns whether the value was stored.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, error = %e, "error storing mirror entry");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        let result = self.read_all().and_then(|mut map| {
            map.remove(key);
            self.write_all(&map)
        });
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, error = %e, "error removing mirror entry");
                false
            }
        }
    }

    pub fn cache_clients(&self, clients: &[Client]) -> bool {
        self.set(CLIENTS_KEY, &clients)
    }

    pub fn cached_clients(&self) -> Option<Vec<Client>> {
        self.get(CLIENTS_KEY)
    }

    /// Replaces one client's entries in `calendarPosts`, keeping the others.
    pub fn cache_client_posts(&self, client_id: &str, posts: &[Post]) -> bool {
        let mut all: Vec<Post> = self.get(POSTS_KEY).unwrap_or_default();
        all.retain(|p| p.client_id != client_id);
        all.extend(posts.iter().cloned());
        self.set(POSTS_KEY, &all)
    }

    pub fn cached_client_posts(&self, client_id: &str) -> Option<Vec<Post>> {
        let all: Vec<Post> = self.get(POSTS_KEY)?;
        Some(all.into_iter().filter(|p| p.client_id == client_id).collect())
    }

    /// Drops a client and its posts from the cache.
    pub fn forget_client(&self, client_id: &str) -> bool {
        let clients_ok = match self.cached_clients() {
            Some(mut clients) => {
                clients.retain(|c| c.id != client_id);
                self.cache_clients(&clients)
            }
            None => true,
        };
        clients_ok && self.cache_client_posts(client_id, &[])
    }
}
