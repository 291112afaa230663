use std::fs;
use std::path::Path;

use rand::Rng;
use thiserror::Error;

use crate::blob::BlobStore;
use crate::errors::{CalError, Result};
use crate::storage::RemoteStore;
use crate::storage::models::{Post, PostPatch};

const KEY_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const KEY_SUFFIX_LEN: usize = 11;

/// An image picked for upload: original file name plus its bytes.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self { name, data })
    }
}

/// A batch upload stopped early. Files before the failing one stay committed.
#[derive(Debug, Error)]
#[error("upload aborted after {committed} file(s): {source}")]
pub struct UploadError {
    pub committed: usize,
    #[source]
    pub source: CalError,
}

fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// `{post_id}_{random}.{ext}`, keeping the original extension.
pub fn storage_key(post_id: i64, file_name: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect();
    format!("{}_{}.{}", post_id, suffix, extension(file_name))
}

fn upload_one<S, B>(store: &S, blobs: &B, post: &mut Post, file: &ImageFile) -> Result<String>
where
    S: RemoteStore + ?Sized,
    B: BlobStore + ?Sized,
{
    if image::guess_format(&file.data).is_err() {
        return Err(CalError::InvalidInput(format!(
            "{} is not a recognised image",
            file.name
        )));
    }

    let key = storage_key(post.id, &file.name);
    blobs.upload(&key, &file.data)?;
    let url = blobs.public_url(&key);
    let row = store.insert_post_image(post.id, &url)?;

    post.images.push(url.clone());
    let persisted = store.update_post(
        post.id,
        &PostPatch {
            images: Some(post.images.clone()),
            ..Default::default()
        },
    );
    if let Err(e) = persisted {
        // Only a file whose URL reached the post's image list counts as attached.
        post.images.pop();
        if let Err(cleanup) = store.delete_post_image(row.id) {
            tracing::warn!(post_id = post.id, %url, error = %cleanup, "could not delete orphaned image row");
        }
        if let Err(cleanup) = blobs.remove(&[key]) {
            tracing::warn!(post_id = post.id, %url, error = %cleanup, "could not delete orphaned blob");
        }
        return Err(e);
    }
    Ok(url)
}

/// Uploads `files` one after another and attaches each to `post`.
///
/// Returns how many files were attached. The first failure aborts the rest of
/// the batch; nothing already committed is rolled back.
pub fn upload_images<S, B>(
    store: &S,
    blobs: &B,
    post: &mut Post,
    files: &[ImageFile],
) -> std::result::Result<usize, UploadError>
where
    S: RemoteStore + ?Sized,
    B: BlobStore + ?Sized,
{
    let mut committed = 0;
    for file in files {
        match upload_one(store, blobs, post, file) {
            Ok(url) => {
                tracing::info!(post_id = post.id, %url, "attached image");
                committed += 1;
            }
            Err(source) => {
                tracing::error!(
                    post_id = post.id,
                    file = %file.name,
                    committed,
                    error = %source,
                    "image upload aborted"
                );
                return Err(UploadError { committed, source });
            }
        }
    }
    Ok(committed)
}

/// Detaches the image at `index` from `post` and returns its URL.
///
/// Row and blob removal are best effort: their failures are logged and the
/// URL is still spliced out of the post.
pub fn remove_image<S, B>(store: &S, blobs: &B, post: &mut Post, index: usize) -> Result<String>
where
    S: RemoteStore + ?Sized,
    B: BlobStore + ?Sized,
{
    let url = post.images.get(index).cloned().ok_or_else(|| {
        CalError::InvalidInput(format!(
            "Post {} has no image at position {}",
            post.id, index
        ))
    })?;

    match store.find_post_image(post.id, &url) {
        Ok(Some(row)) => {
            if let Err(e) = store.delete_post_image(row.id) {
                tracing::warn!(post_id = post.id, %url, error = %e, "could not delete image row");
            }
        }
        Ok(None) => tracing::warn!(post_id = post.id, %url, "no image row for url"),
        Err(e) => tracing::warn!(post_id = post.id, %url, error = %e, "image row lookup failed"),
    }

    if let Some(key) = blobs.key_for_url(&url)
        && let Err(e) = blobs.remove(&[key])
    {
        tracing::warn!(post_id = post.id, %url, error = %e, "could not delete blob");
    }

    post.images.remove(index);
    if let Err(e) = store.update_post(
        post.id,
        &PostPatch {
            images: Some(post.images.clone()),
            ..Default::default()
        },
    ) {
        tracing::warn!(post_id = post.id, error = %e, "could not persist image list");
    }

    tracing::info!(post_id = post.id, %url, "removed image");
    Ok(url)
}
