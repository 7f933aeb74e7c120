//! In-memory record store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{DrawingRecord, RecordStore};
use crate::error::{StoreError, StoreResult};
use crate::slug::Slug;

/// Record store for tests and single-process use
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<Slug, DrawingRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("Lock error: {}", e))
}

// Timestamps never move backwards for a record, even on a coarse clock.
fn next_timestamp(after: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(after + Duration::microseconds(1))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn exists(&self, slug: &Slug) -> StoreResult<bool> {
        let records = self.records.read().map_err(lock_error)?;
        Ok(records.contains_key(slug))
    }

    async fn create(
        &self,
        slug: &Slug,
        encrypted_payload: &[u8],
        encryption_key: &str,
    ) -> StoreResult<DrawingRecord> {
        let mut records = self.records.write().map_err(lock_error)?;
        if records.contains_key(slug) {
            return Err(StoreError::SlugConflict(slug.to_string()));
        }

        let now = Utc::now();
        let record = DrawingRecord {
            id: Uuid::new_v4(),
            slug: slug.clone(),
            encrypted_payload: encrypted_payload.to_vec(),
            encryption_key: encryption_key.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
        };
        records.insert(slug.clone(), record.clone());
        Ok(record)
    }

    async fn read(&self, slug: &Slug) -> StoreResult<DrawingRecord> {
        let mut records = self.records.write().map_err(lock_error)?;
        let record = records
            .get_mut(slug)
            .ok_or_else(|| StoreError::NotFound(format!("drawing `{}`", slug)))?;
        record.last_accessed_at = next_timestamp(record.last_accessed_at);
        Ok(record.clone())
    }

    async fn update(
        &self,
        slug: &Slug,
        encrypted_payload: &[u8],
        encryption_key: &str,
        expected_version: Option<i32>,
    ) -> StoreResult<DrawingRecord> {
        let mut records = self.records.write().map_err(lock_error)?;
        let record = records
            .get_mut(slug)
            .ok_or_else(|| StoreError::NotFound(format!("drawing `{}`", slug)))?;

        if let Some(expected) = expected_version {
            if record.version != expected {
                return Err(StoreError::StaleVersion {
                    slug: slug.to_string(),
                    expected,
                    actual: record.version,
                });
            }
        }

        record.encrypted_payload = encrypted_payload.to_vec();
        record.encryption_key = encryption_key.to_string();
        record.version += 1;
        record.updated_at = next_timestamp(record.updated_at);
        Ok(record.clone())
    }
}
