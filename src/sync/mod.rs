// ABOUTME: One-way mirror of a local content root into a storage resource.
// ABOUTME: Hash-compares against the remote listing; uploads run bounded-parallel.

use crate::provider::{ObjectOps, ProviderError};
use crate::types::{ObjectKey, ProviderId};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const UPLOAD_CONCURRENCY: usize = 8;

/// What one mirror pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("content root {0} does not exist or is not a directory")]
    MissingRoot(PathBuf),

    #[error("failed to walk content root: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to upload `{key}`: {source}")]
    Upload {
        key: ObjectKey,
        source: ProviderError,
    },

    #[error("failed to delete remote object `{key}`: {source}")]
    Delete {
        key: ObjectKey,
        source: ProviderError,
    },

    #[error("failed to list remote objects: {0}")]
    List(ProviderError),
}

/// Mirror a local directory into the target storage resource.
///
/// Uploads new and changed files (content-hash comparison), removes
/// remote objects with no local counterpart, and leaves matching
/// objects alone. Stateless: every pass re-derives the difference from
/// the walk and the remote listing.
pub async fn mirror(
    provider: &dyn ObjectOps,
    target: &ProviderId,
    root: &Path,
) -> Result<SyncReport, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::MissingRoot(root.to_path_buf()));
    }

    let mut local: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walked paths stay under the root");
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        local.insert(key, entry.path().to_path_buf());
    }

    let remote: BTreeMap<String, String> = provider
        .list_objects(target)
        .await
        .map_err(SyncError::List)?
        .into_iter()
        .map(|object| (object.key.into_inner(), object.content_hash))
        .collect();

    let mut to_upload: Vec<(ObjectKey, Bytes)> = Vec::new();
    let mut unchanged = 0;
    for (key, path) in &local {
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| SyncError::Read {
                path: path.clone(),
                source,
            })?;
        let hash = blake3::hash(&body).to_hex().to_string();
        if remote.get(key) == Some(&hash) {
            unchanged += 1;
            continue;
        }
        to_upload.push((ObjectKey::new(key.clone()), Bytes::from(body)));
    }

    let uploaded = to_upload.len();
    let mut uploads = stream::iter(to_upload.into_iter().map(|(key, body)| async move {
        provider
            .put_object(target, &key, body)
            .await
            .map_err(|source| SyncError::Upload { key, source })
    }))
    .buffer_unordered(UPLOAD_CONCURRENCY);
    while let Some(result) = uploads.next().await {
        result?;
    }
    drop(uploads);

    let mut deleted = 0;
    for key in remote.keys() {
        if !local.contains_key(key) {
            let key = ObjectKey::new(key.clone());
            provider
                .delete_object(target, &key)
                .await
                .map_err(|source| SyncError::Delete { key, source })?;
            deleted += 1;
        }
    }

    tracing::debug!(
        "content sync: {uploaded} uploaded, {deleted} deleted, {unchanged} unchanged"
    );

    Ok(SyncReport {
        uploaded,
        deleted,
        unchanged,
    })
}
