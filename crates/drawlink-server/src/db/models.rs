use chrono::{DateTime, Utc};
use drawlink_core::{DrawingRecord, Slug, StoreError};
use uuid::Uuid;

/// Drawing database model
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DrawingRow {
    pub id: Uuid,
    pub slug: String,
    pub encrypted_data: Vec<u8>,
    pub encryption_key: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl TryFrom<DrawingRow> for DrawingRecord {
    type Error = StoreError;

    fn try_from(row: DrawingRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(row.slug.as_str())
            .map_err(|e| StoreError::Unavailable(format!("Stored slug {:?} is invalid: {}", row.slug, e)))?;
        Ok(DrawingRecord {
            id: row.id,
            slug,
            encrypted_payload: row.encrypted_data,
            encryption_key: row.encryption_key,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_accessed_at: row.last_accessed_at,
        })
    }
}
