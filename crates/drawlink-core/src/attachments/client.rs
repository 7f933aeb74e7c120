use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::{AttachmentScope, BlobStore, OversizePolicy, RejectReason, UploadReport};
use crate::codec::{self, EncryptionKey};
use crate::error::{CodecError, StoreError};
use crate::scene::{BinaryFile, FileId};

/// Largest encoded attachment accepted for upload
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 4 * 1024 * 1024;

/// Attachments partitioned by whether they could be fetched and opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadResult {
    pub loaded: BTreeMap<FileId, BinaryFile>,
    pub errored: BTreeSet<FileId>,
}

#[derive(Error, Debug)]
enum FetchFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("blob holds attachment `{0}`")]
    Mismatch(FileId),
}

/// Attachments encrypted and size-checked, waiting to be stored
#[derive(Debug, Clone, Default)]
pub struct PreparedUpload {
    encoded: Vec<(FileId, Vec<u8>)>,
    report: UploadReport,
}

impl PreparedUpload {
    /// Rejections found while preparing; nothing is uploaded yet
    pub fn report(&self) -> &UploadReport {
        &self.report
    }

    pub fn is_aborted(&self) -> bool {
        self.report.aborted
    }

    /// Number of attachments that will be stored
    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

/// Encrypts, size-checks and transfers attachments through a [`BlobStore`]
#[derive(Clone)]
pub struct AttachmentClient {
    store: Arc<dyn BlobStore>,
    max_bytes: usize,
}

impl AttachmentClient {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Encrypt and size-check `files` without touching the store.
    ///
    /// Oversized attachments are always listed in `rejected`; under
    /// [`OversizePolicy::Abort`] any rejection marks the batch aborted and
    /// nothing will be stored.
    pub fn prepare<'a>(
        &self,
        files: impl IntoIterator<Item = &'a BinaryFile>,
        key: &EncryptionKey,
        policy: OversizePolicy,
    ) -> PreparedUpload {
        let mut prepared = PreparedUpload::default();

        for file in files {
            match codec::encode_attachment(file, key) {
                Ok(bytes) if bytes.len() > self.max_bytes => {
                    warn!(
                        file_id = %file.id,
                        size = bytes.len(),
                        max = self.max_bytes,
                        "Attachment exceeds size limit"
                    );
                    prepared.report.rejected.insert(
                        file.id.clone(),
                        RejectReason::TooLarge {
                            size: bytes.len(),
                            max: self.max_bytes,
                        },
                    );
                }
                Ok(bytes) => prepared.encoded.push((file.id.clone(), bytes)),
                Err(e) => {
                    prepared.report.rejected.insert(
                        file.id.clone(),
                        RejectReason::EncodingFailed {
                            detail: e.to_string(),
                        },
                    );
                }
            }
        }

        if !prepared.report.rejected.is_empty() && policy == OversizePolicy::Abort {
            prepared.report.aborted = true;
            prepared.encoded.clear();
        }
        prepared
    }

    /// Store a prepared batch under `scope`. Puts run concurrently.
    pub async fn put(&self, scope: &AttachmentScope, prepared: PreparedUpload) -> UploadReport {
        let PreparedUpload { encoded, mut report } = prepared;
        if report.aborted {
            return report;
        }

        let results = join_all(encoded.into_iter().map(|(id, bytes)| async move {
            let result = self.store.put(scope, &id, bytes).await;
            (id, result)
        }))
        .await;

        for (id, result) in results {
            match result {
                Ok(()) => {
                    report.uploaded.insert(id);
                }
                Err(e) => {
                    error!(scope = %scope, file_id = %id, "Failed to upload attachment: {}", e);
                    report.failed.insert(id);
                }
            }
        }

        debug!(
            scope = %scope,
            uploaded = report.uploaded.len(),
            rejected = report.rejected.len(),
            failed = report.failed.len(),
            "Attachment upload finished"
        );
        report
    }

    /// Encrypt and upload `files` under `scope`: [`prepare`](Self::prepare)
    /// followed by [`put`](Self::put).
    pub async fn upload<'a>(
        &self,
        scope: &AttachmentScope,
        files: impl IntoIterator<Item = &'a BinaryFile>,
        key: &EncryptionKey,
        policy: OversizePolicy,
    ) -> UploadReport {
        let prepared = self.prepare(files, key, policy);
        self.put(scope, prepared).await
    }

    /// Fetch and decrypt `ids` under `scope`.
    ///
    /// Never fails as a whole: anything missing, unreadable or undecryptable
    /// ends up in `errored`.
    pub async fn download(
        &self,
        scope: &AttachmentScope,
        key: &EncryptionKey,
        ids: &BTreeSet<FileId>,
    ) -> DownloadResult {
        let results = join_all(ids.iter().map(|id| async move {
            let result = self.fetch(scope, id, key).await;
            (id.clone(), result)
        }))
        .await;

        let mut outcome = DownloadResult::default();
        for (id, result) in results {
            match result {
                Ok(file) => {
                    outcome.loaded.insert(id, file);
                }
                Err(e) => {
                    warn!(scope = %scope, file_id = %id, "Failed to load attachment: {}", e);
                    outcome.errored.insert(id);
                }
            }
        }
        outcome
    }

    async fn fetch(
        &self,
        scope: &AttachmentScope,
        id: &FileId,
        key: &EncryptionKey,
    ) -> Result<BinaryFile, FetchFailure> {
        let bytes = self.store.get(scope, id).await?;
        let file = codec::decode_attachment(&bytes, key)?;
        if file.id != *id {
            return Err(FetchFailure::Mismatch(file.id));
        }
        Ok(file)
    }
}
