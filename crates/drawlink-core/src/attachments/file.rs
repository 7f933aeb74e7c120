//! Filesystem blob store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::{AttachmentScope, BlobStore};
use crate::error::{StoreError, StoreResult};
use crate::scene::FileId;

/// Stores each blob as a file under `<base>/<scope>/<file id>`
pub struct FileBlobStore {
    base_path: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `base_path`, creating the directory if needed
    pub async fn new(base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::Unavailable(format!(
                "Failed to create attachment directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn blob_path(&self, scope: &AttachmentScope, file_id: &FileId) -> PathBuf {
        let mut path = self.base_path.clone();
        for segment in scope.as_str().split('/').filter(|s| !s.is_empty()) {
            path.push(escape(segment));
        }
        path.push(escape(file_id.as_str()));
        path
    }
}

/// Map an arbitrary id onto a safe file name without collisions
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => out.push(byte as char),
            b'_' => out.push_str("__"),
            other => out.push_str(&format!("_{:02x}", other)),
        }
    }
    out
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("blob");
    path.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()))
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, scope: &AttachmentScope, file_id: &FileId, bytes: Vec<u8>) -> StoreResult<()> {
        let path = self.blob_path(scope, file_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Unavailable(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Write next to the target, then rename so readers never see a partial blob.
        // Every put gets its own temp file; escaped names never contain '.'.
        let partial = partial_path(&path);
        if let Err(e) = fs::write(&partial, &bytes).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StoreError::Unavailable(format!(
                "Failed to write {}: {}",
                partial.display(),
                e
            )));
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(StoreError::Unavailable(format!(
                "Failed to move {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }

    async fn get(&self, scope: &AttachmentScope, file_id: &FileId) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(scope, file_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(format!(
                "attachment `{}/{}`",
                scope, file_id
            ))),
            Err(e) => Err(StoreError::Unavailable(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
