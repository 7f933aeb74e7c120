pub mod address;
pub mod attachments;
pub mod codec;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod scene;
pub mod service;
pub mod slug;
pub mod task;

pub use address::DrawingAddress;
pub use attachments::{
    AttachmentClient, AttachmentScope, BlobStore, DownloadResult, FileBlobStore, MemoryBlobStore,
    OversizePolicy, PreparedUpload, RejectReason, UploadReport, DEFAULT_MAX_ATTACHMENT_BYTES,
};
pub use codec::{generate_key, DecodedScene, EncryptionKey};
pub use error::{CodecError, DrawingError, StoreError, StoreResult};
pub use reconcile::{Reconciled, Reconciliation};
pub use record::{DrawingRecord, DrawingSummary, MemoryRecordStore, RecordStore};
pub use scene::{BinaryFile, Element, ElementKind, FileId, FileManifest, Scene, Theme, ViewState};
pub use service::{
    Availability, DrawingService, DrawingSession, LoadedDrawing, PersistentDrawing, ServiceConfig,
    UpdatedDrawing,
};
pub use slug::{Slug, SlugError, MAX_SLUG_LEN};
pub use task::{Operation, OperationState};
