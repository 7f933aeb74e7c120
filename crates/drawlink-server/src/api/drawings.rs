use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use drawlink_core::{DrawingRecord, DrawingSummary, EncryptionKey, Slug};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Request to create a new drawing
#[derive(Debug, Deserialize)]
pub struct CreateDrawingRequest {
    pub slug: String,
    /// Base64 of the sealed scene payload
    pub encrypted_data: String,
    pub encryption_key: String,
}

/// Request to replace a drawing's payload
#[derive(Debug, Deserialize)]
pub struct UpdateDrawingRequest {
    pub encrypted_data: String,
    pub encryption_key: String,
    /// Reject the update unless the stored version still matches
    #[serde(default)]
    pub expected_version: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// Drawing metadata returned by create and update
#[derive(Debug, Serialize)]
pub struct DrawingSummaryResponse {
    pub id: Uuid,
    pub slug: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DrawingSummary> for DrawingSummaryResponse {
    fn from(summary: DrawingSummary) -> Self {
        Self {
            id: summary.id,
            slug: summary.slug.into(),
            version: summary.version,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }
    }
}

/// Full drawing returned by get
#[derive(Debug, Serialize)]
pub struct DrawingResponse {
    pub id: Uuid,
    pub slug: String,
    pub encrypted_data: String,
    pub encryption_key: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DrawingRecord> for DrawingResponse {
    fn from(record: DrawingRecord) -> Self {
        Self {
            id: record.id,
            slug: record.slug.into(),
            encrypted_data: STANDARD.encode(&record.encrypted_payload),
            encryption_key: record.encryption_key,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn parse_payload(encrypted_data: &str) -> Result<Vec<u8>, AppError> {
    let bytes = STANDARD
        .decode(encrypted_data)
        .map_err(|_| AppError::BadRequest("Encrypted data must be valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Encrypted data is required".to_string()));
    }
    Ok(bytes)
}

fn parse_key(encryption_key: &str) -> Result<(), AppError> {
    encryption_key
        .parse::<EncryptionKey>()
        .map(|_| ())
        .map_err(|_| AppError::BadRequest("Encryption key is malformed".to_string()))
}

/// Check whether a slug is taken
async fn drawing_exists(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ExistsResponse>, AppError> {
    let slug = Slug::parse(slug)?;
    let exists = state.records.exists(&slug).await?;
    Ok(Json(ExistsResponse { exists }))
}

/// Get a drawing by slug
async fn get_drawing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<DrawingResponse>, AppError> {
    let slug = Slug::parse(slug)?;
    let record = state.records.read(&slug).await?;
    tracing::debug!(slug = %slug, version = record.version, "Served drawing");
    Ok(Json(record.into()))
}

/// Create a new drawing
async fn create_drawing(
    State(state): State<AppState>,
    payload: Result<Json<CreateDrawingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DrawingSummaryResponse>), AppError> {
    let Json(req) = payload?;
    let slug = Slug::parse(req.slug)?;
    let data = parse_payload(&req.encrypted_data)?;
    parse_key(&req.encryption_key)?;

    let record = state
        .records
        .create(&slug, &data, &req.encryption_key)
        .await?;
    tracing::info!(slug = %slug, id = %record.id, "Created drawing");

    Ok((StatusCode::CREATED, Json(record.summary().into())))
}

/// Replace a drawing's payload
async fn update_drawing(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: Result<Json<UpdateDrawingRequest>, JsonRejection>,
) -> Result<Json<DrawingSummaryResponse>, AppError> {
    let Json(req) = payload?;
    let slug = Slug::parse(slug)?;
    let data = parse_payload(&req.encrypted_data)?;
    parse_key(&req.encryption_key)?;

    let record = state
        .records
        .update(&slug, &data, &req.encryption_key, req.expected_version)
        .await?;
    tracing::info!(slug = %slug, version = record.version, "Updated drawing");

    Ok(Json(record.summary().into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/drawings", post(create_drawing))
        .route("/api/drawings/{slug}", get(get_drawing).put(update_drawing))
        .route("/api/drawings/{slug}/exists", get(drawing_exists))
}
