//! Durable drawing records keyed by slug.

mod memory;

pub use memory::MemoryRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::slug::Slug;

/// The durable unit of a persistent drawing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingRecord {
    pub id: Uuid,
    pub slug: Slug,
    pub encrypted_payload: Vec<u8>,
    /// String form of the key that opens the payload and its attachments
    pub encryption_key: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// Record metadata without payload or key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingSummary {
    pub id: Uuid,
    pub slug: Slug,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DrawingRecord {
    pub fn summary(&self) -> DrawingSummary {
        DrawingSummary {
            id: self.id,
            slug: self.slug.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A uniquely-keyed table of drawing records.
///
/// Implementations must enforce slug uniqueness in the store itself so two
/// concurrent `create` calls for one slug cannot both succeed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check whether a record exists for `slug`
    async fn exists(&self, slug: &Slug) -> StoreResult<bool>;

    /// Insert a record at version 1; fails with `SlugConflict` if taken
    async fn create(
        &self,
        slug: &Slug,
        encrypted_payload: &[u8],
        encryption_key: &str,
    ) -> StoreResult<DrawingRecord>;

    /// Fetch a record and refresh its `last_accessed_at`
    async fn read(&self, slug: &Slug) -> StoreResult<DrawingRecord>;

    /// Replace the payload and bump the version by one.
    ///
    /// With `expected_version` set, the write only applies when the stored
    /// version matches; otherwise it fails with `StaleVersion`.
    async fn update(
        &self,
        slug: &Slug,
        encrypted_payload: &[u8],
        encryption_key: &str,
        expected_version: Option<i32>,
    ) -> StoreResult<DrawingRecord>;
}
