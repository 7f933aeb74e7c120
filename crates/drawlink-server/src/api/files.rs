use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use drawlink_core::{AttachmentScope, FileId, Slug, StoreError};

use crate::error::AppError;
use crate::AppState;

const MAX_FILE_ID_LEN: usize = 128;

fn parse_file_id(raw: String) -> Result<FileId, AppError> {
    let valid = !raw.is_empty()
        && raw.len() <= MAX_FILE_ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid {
        return Err(AppError::BadRequest("Invalid file id".to_string()));
    }
    Ok(FileId::new(raw))
}

fn file_not_found(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound(_) => AppError::NotFound("File not found".to_string()),
        other => other.into(),
    }
}

/// Store an encrypted attachment
async fn put_file(
    State(state): State<AppState>,
    Path((slug, file_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let slug = Slug::parse(slug)?;
    let file_id = parse_file_id(file_id)?;

    if body.is_empty() {
        return Err(AppError::BadRequest("File body is required".to_string()));
    }
    if body.len() > state.max_attachment_bytes {
        tracing::warn!(slug = %slug, file_id = %file_id, size = body.len(), "Rejected oversized file");
        return Err(AppError::PayloadTooLarge(format!(
            "File too big (limit {} bytes)",
            state.max_attachment_bytes
        )));
    }

    let scope = AttachmentScope::for_slug(&slug);
    state.attachments.put(&scope, &file_id, body.to_vec()).await?;
    tracing::debug!(slug = %slug, file_id = %file_id, "Stored file");

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch an encrypted attachment
async fn get_file(
    State(state): State<AppState>,
    Path((slug, file_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let slug = Slug::parse(slug)?;
    let file_id = parse_file_id(file_id)?;

    let scope = AttachmentScope::for_slug(&slug);
    let bytes = state
        .attachments
        .get(&scope, &file_id)
        .await
        .map_err(file_not_found)?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/files/{slug}/{file_id}", get(get_file).put(put_file))
}
