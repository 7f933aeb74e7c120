pub mod models;

use async_trait::async_trait;
use drawlink_core::{DrawingRecord, RecordStore, Slug, StoreError, StoreResult};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;
use models::DrawingRow;

const DRAWING_COLUMNS: &str =
    "id, slug, encrypted_data, encryption_key, version, created_at, updated_at, last_accessed_at";

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let options = config.database.connect_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .idle_timeout(config.db_idle_timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Current version of a drawing, if it exists
    async fn current_version(&self, slug: &Slug) -> StoreResult<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM drawings WHERE slug = $1")
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(row.map(|(version,)| version))
    }
}

/// Map a driver error onto the store taxonomy, keeping the detail for logs
fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("Database error: {}", err))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl RecordStore for Database {
    async fn exists(&self, slug: &Slug) -> StoreResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM drawings WHERE slug = $1)")
                .bind(slug.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(exists)
    }

    async fn create(
        &self,
        slug: &Slug,
        encrypted_payload: &[u8],
        encryption_key: &str,
    ) -> StoreResult<DrawingRecord> {
        let row = sqlx::query_as::<_, DrawingRow>(&format!(
            "INSERT INTO drawings (slug, encrypted_data, encryption_key) VALUES ($1, $2, $3) RETURNING {}",
            DRAWING_COLUMNS
        ))
        .bind(slug.as_str())
        .bind(encrypted_payload)
        .bind(encryption_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::SlugConflict(slug.to_string())
            } else {
                unavailable(e)
            }
        })?;

        row.try_into()
    }

    async fn read(&self, slug: &Slug) -> StoreResult<DrawingRecord> {
        let row = sqlx::query_as::<_, DrawingRow>(&format!(
            "UPDATE drawings SET last_accessed_at = NOW() WHERE slug = $1 RETURNING {}",
            DRAWING_COLUMNS
        ))
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| StoreError::NotFound(format!("drawing `{}`", slug)))?;

        row.try_into()
    }

    async fn update(
        &self,
        slug: &Slug,
        encrypted_payload: &[u8],
        encryption_key: &str,
        expected_version: Option<i32>,
    ) -> StoreResult<DrawingRecord> {
        let row = sqlx::query_as::<_, DrawingRow>(&format!(
            r#"UPDATE drawings
               SET encrypted_data = $1, encryption_key = $2, version = version + 1, updated_at = NOW()
               WHERE slug = $3 AND ($4::INTEGER IS NULL OR version = $4)
               RETURNING {}"#,
            DRAWING_COLUMNS
        ))
        .bind(encrypted_payload)
        .bind(encryption_key)
        .bind(slug.as_str())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match (row, expected_version) {
            (Some(row), _) => row.try_into(),
            (None, Some(expected)) => match self.current_version(slug).await? {
                Some(actual) => Err(StoreError::StaleVersion {
                    slug: slug.to_string(),
                    expected,
                    actual,
                }),
                None => Err(StoreError::NotFound(format!("drawing `{}`", slug))),
            },
            (None, None) => Err(StoreError::NotFound(format!("drawing `{}`", slug))),
        }
    }
}
