//! Binary attachment storage.
//!
//! Attachments live outside the drawing record, addressed by a scope prefix
//! derived from the slug plus the attachment id. The [`BlobStore`] trait is the
//! raw byte boundary; [`AttachmentClient`] layers per-file encryption, size
//! limits and partial-failure reporting on top of it.

mod client;
mod file;
mod memory;

pub use client::{AttachmentClient, DownloadResult, PreparedUpload, DEFAULT_MAX_ATTACHMENT_BYTES};
pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::scene::FileId;
use crate::slug::Slug;

/// Storage prefix that keeps one drawing's attachments apart from another's
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentScope(String);

impl AttachmentScope {
    pub fn for_slug(slug: &Slug) -> Self {
        Self(format!("files/drawings/{}", slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttachmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw byte store for encrypted attachments
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `(scope, file_id)`, replacing any previous value
    async fn put(&self, scope: &AttachmentScope, file_id: &FileId, bytes: Vec<u8>) -> StoreResult<()>;

    /// Fetch the bytes under `(scope, file_id)`; `NotFound` when absent
    async fn get(&self, scope: &AttachmentScope, file_id: &FileId) -> StoreResult<Vec<u8>>;
}

/// What to do when an attachment exceeds the size limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Upload nothing if any attachment is too large
    #[default]
    Abort,
    /// Upload the rest and report the oversized ones
    Skip,
}

/// Why an attachment was not uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    TooLarge { size: usize, max: usize },
    EncodingFailed { detail: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooLarge { size, max } => {
                write!(f, "File too big ({} bytes, limit {} bytes)", size, max)
            }
            RejectReason::EncodingFailed { detail } => write!(f, "Could not encode file: {}", detail),
        }
    }
}

/// Per-attachment outcome of an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub uploaded: BTreeSet<FileId>,
    pub rejected: BTreeMap<FileId, RejectReason>,
    /// Attachments the blob store failed to accept
    pub failed: BTreeSet<FileId>,
    /// Set when an oversized attachment stopped the whole upload
    pub aborted: bool,
}

impl UploadReport {
    /// Whether the caller can treat the upload as successful
    pub fn is_success(&self) -> bool {
        !self.aborted && self.failed.is_empty()
    }
}
