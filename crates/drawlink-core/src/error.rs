use thiserror::Error;

use crate::attachments::UploadReport;
use crate::record::DrawingSummary;

/// Errors produced while sealing or opening an encrypted container
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload is truncated")]
    Truncated,

    #[error("payload has an unknown format")]
    UnknownFormat,

    #[error("encryption key is malformed")]
    InvalidKey,

    #[error("payload could not be encrypted")]
    Encryption,

    #[error("payload could not be decrypted")]
    Decryption,

    #[error("payload could not be decompressed")]
    Decompression,

    #[error("payload exceeds {0} bytes once decompressed")]
    TooLarge(usize),

    #[error("payload does not match the drawing schema: {0}")]
    Schema(String),
}

/// Errors reported by record and blob stores
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("slug `{0}` already exists")]
    SlugConflict(String),

    #[error("stale version for `{slug}`: expected {expected}, found {actual}")]
    StaleVersion {
        slug: String,
        expected: i32,
        actual: i32,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Caller-facing error taxonomy of the drawing service
#[derive(Error, Debug)]
pub enum DrawingError {
    #[error("{0}")]
    Validation(String),

    #[error("Slug already exists")]
    Conflict(String),

    #[error("Drawing not found")]
    NotFound(String),

    #[error("Drawing was changed elsewhere (expected version {expected}, found {actual})")]
    StaleVersion { expected: i32, actual: i32 },

    #[error("Could not read this drawing")]
    Codec(#[from] CodecError),

    #[error("Storage is temporarily unavailable")]
    StoreUnavailable,

    /// The record write committed but one or more attachments did not.
    /// A later successful update repairs the drawing.
    #[error("Drawing saved at version {}, but some images could not be saved", .record.version)]
    AttachmentsNotSaved {
        record: DrawingSummary,
        report: UploadReport,
    },
}

impl DrawingError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DrawingError::StoreUnavailable => true,
            // An aborted batch fails the same way every time
            DrawingError::AttachmentsNotSaved { report, .. } => !report.aborted,
            _ => false,
        }
    }
}

impl From<StoreError> for DrawingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => DrawingError::NotFound(what),
            StoreError::SlugConflict(slug) => DrawingError::Conflict(slug),
            StoreError::StaleVersion {
                expected, actual, ..
            } => DrawingError::StaleVersion { expected, actual },
            StoreError::Unavailable(detail) => {
                tracing::error!("Store error: {}", detail);
                DrawingError::StoreUnavailable
            }
        }
    }
}
