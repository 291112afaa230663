use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{CalError, Result};

pub const POST_IMAGES_BUCKET: &str = "post_images";

/// A bucket of binary objects addressed by key and served under public URLs.
pub trait BlobStore {
    /// Stores `data` under `key`. Fails if the key is already taken.
    fn upload(&self, key: &str, data: &[u8]) -> Result<()>;
    fn public_url(&self, key: &str) -> String;
    /// The object key behind `url`, if the URL points into this bucket.
    fn key_for_url(&self, url: &str) -> Option<String>;
    fn remove(&self, keys: &[String]) -> Result<usize>;
}

/// Filesystem bucket: objects live under `<root>/<bucket>/<key>`.
pub struct FsBlobStore {
    dir: PathBuf,
    url_prefix: String,
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.starts_with('.')
    {
        return Err(CalError::InvalidInput(format!("Invalid object key: {:?}", key)));
    }
    Ok(())
}

impl FsBlobStore {
    pub fn new(root: &Path, bucket: &str, public_base_url: &str) -> Result<Self> {
        let dir = root.join(bucket);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            url_prefix: format!(
                "{}/storage/v1/object/public/{}/",
                public_base_url.trim_end_matches('/'),
                bucket
            ),
        })
    }

    pub fn post_images(root: &Path, public_base_url: &str) -> Result<Self> {
        Self::new(root, POST_IMAGES_BUCKET, public_base_url)
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_for(key))
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    CalError::Blob(format!("Object {} already exists", key))
                }
                _ => CalError::Io(e),
            })?;
        file.write_all(data)?;
        tracing::debug!(key, bytes = data.len(), "uploaded object");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.url_prefix, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.url_prefix)?;
        validate_key(key).ok()?;
        Some(key.to_string())
    }

    fn remove(&self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            validate_key(key)?;
            match fs::remove_file(self.path_for(key)) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CalError::Io(e)),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bucket(dir: &Path) -> FsBlobStore {
        FsBlobStore::post_images(dir, "https://cdn.example.com/").unwrap()
    }

    #[test]
    fn test_upload_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_bucket(dir.path());
        store.upload("1_abc.png", b"bytes").unwrap();
        let on_disk = fs::read(dir.path().join("post_images/1_abc.png")).unwrap();
        assert_eq!(on_disk, b"bytes");
    }

    #[test]
    fn test_upload_duplicate_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_bucket(dir.path());
        store.upload("dup.png", b"a").unwrap();
        assert!(matches!(store.upload("dup.png", b"b"), Err(CalError::Blob(_))));
    }

    #[test]
    fn test_upload_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_bucket(dir.path());
        assert!(matches!(store.upload("../x.png", b"a"), Err(CalError::InvalidInput(_))));
        assert!(matches!(store.upload("a/b.png", b"a"), Err(CalError::InvalidInput(_))));
    }

    #[test]
    fn test_public_url_and_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_bucket(dir.path());
        let url = store.public_url("9_k.jpg");
        assert_eq!(
            url,
            "https://cdn.example.com/storage/v1/object/public/post_images/9_k.jpg"
        );
        assert_eq!(store.key_for_url(&url).as_deref(), Some("9_k.jpg"));
    }

    #[test]
    fn test_foreign_url_not_recognised() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_bucket(dir.path());
        assert!(store.key_for_url("https://images.example.org/9_k.jpg").is_none());
    }

    #[test]
    fn test_remove_counts_existing_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_bucket(dir.path());
        store.upload("a.png", b"a").unwrap();
        let removed = store
            .remove(&["a.png".to_string(), "missing.png".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.path_for("a.png").exists());
    }
}
