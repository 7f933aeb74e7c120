use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drawlink_core::{SlugError, StoreError};
use serde_json::json;
use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.as_str()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.as_str()),
            AppError::Unavailable(detail) => {
                tracing::error!("Store error: {}", detail);
                (StatusCode::SERVICE_UNAVAILABLE, "Storage is temporarily unavailable")
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound("Drawing not found".to_string()),
            StoreError::SlugConflict(_) => AppError::Conflict("Slug already exists".to_string()),
            StoreError::StaleVersion { .. } => AppError::Conflict(err.to_string()),
            StoreError::Unavailable(detail) => AppError::Unavailable(detail),
        }
    }
}

impl From<SlugError> for AppError {
    fn from(err: SlugError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_store_details_are_hidden() {
        let err: AppError =
            StoreError::Unavailable("password authentication failed for user postgres".into()).into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Storage is temporarily unavailable");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, body) = body_of(StoreError::SlugConflict("plan".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Slug already exists");

        let (status, _) = body_of(StoreError::NotFound("drawing `plan`".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let stale = StoreError::StaleVersion {
            slug: "plan".into(),
            expected: 1,
            actual: 2,
        };
        let (status, _) = body_of(stale.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
