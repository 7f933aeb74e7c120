//! In-memory blob store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{AttachmentScope, BlobStore};
use crate::error::{StoreError, StoreResult};
use crate::scene::FileId;

/// Blob store for tests and ephemeral use
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(AttachmentScope, FileId), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs across all scopes
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a stored blob, e.g. to simulate corruption
    pub fn corrupt(&self, scope: &AttachmentScope, file_id: &FileId, bytes: Vec<u8>) {
        if let Ok(mut blobs) = self.blobs.write() {
            blobs.insert((scope.clone(), file_id.clone()), bytes);
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, scope: &AttachmentScope, file_id: &FileId, bytes: Vec<u8>) -> StoreResult<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Lock error: {}", e)))?;
        blobs.insert((scope.clone(), file_id.clone()), bytes);
        Ok(())
    }

    async fn get(&self, scope: &AttachmentScope, file_id: &FileId) -> StoreResult<Vec<u8>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Lock error: {}", e)))?;
        blobs
            .get(&(scope.clone(), file_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("attachment `{}/{}`", scope, file_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slug::Slug;

    #[tokio::test]
    async fn test_scopes_do_not_collide() {
        let store = MemoryBlobStore::new();
        let a = AttachmentScope::for_slug(&Slug::parse("a").unwrap());
        let b = AttachmentScope::for_slug(&Slug::parse("b").unwrap());
        let id = FileId::new("same");

        store.put(&a, &id, vec![1]).await.unwrap();
        store.put(&b, &id, vec![2]).await.unwrap();

        assert_eq!(store.get(&a, &id).await.unwrap(), vec![1]);
        assert_eq!(store.get(&b, &id).await.unwrap(), vec![2]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = MemoryBlobStore::new();
        let scope = AttachmentScope::for_slug(&Slug::parse("a").unwrap());
        let result = store.get(&scope, &FileId::new("nope")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
