//! Create, update and load persistent drawings.
//!
//! A write is `encode -> attachment prepare -> record store -> attachment put`.
//! Anything the caller can fix (an oversized image, an unencodable scene) is
//! rejected before the record store is touched. The record write is never
//! rolled back when attachment puts fail; the caller gets
//! [`DrawingError::AttachmentsNotSaved`] and repairs it with a later update.
//! Loads degrade per attachment instead of failing.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::attachments::{
    AttachmentClient, AttachmentScope, OversizePolicy, PreparedUpload, UploadReport,
    DEFAULT_MAX_ATTACHMENT_BYTES,
};
use crate::codec::{self, EncryptionKey};
use crate::error::DrawingError;
use crate::record::{DrawingSummary, RecordStore};
use crate::scene::{FileId, Scene};
use crate::slug::Slug;

/// Settings for [`DrawingService`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Origin that drawing links are built on, e.g. `https://draw.example.com`
    pub public_base_url: String,
    /// Largest encrypted attachment accepted for upload
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,
    #[serde(default)]
    pub oversize_policy: OversizePolicy,
}

fn default_max_attachment_bytes() -> usize {
    DEFAULT_MAX_ATTACHMENT_BYTES
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            oversize_policy: OversizePolicy::default(),
        }
    }
}

/// What a caller needs to keep saving a drawing it created or opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingSession {
    pub slug: Slug,
    pub key: EncryptionKey,
    /// Last version this session wrote or read
    pub version: i32,
}

/// Result of a successful create
#[derive(Debug, Clone)]
pub struct PersistentDrawing {
    pub slug: Slug,
    pub url: String,
    pub encryption_key: EncryptionKey,
    pub summary: DrawingSummary,
    pub attachments: UploadReport,
}

impl PersistentDrawing {
    pub fn session(&self) -> DrawingSession {
        DrawingSession {
            slug: self.slug.clone(),
            key: self.encryption_key.clone(),
            version: self.summary.version,
        }
    }
}

/// Result of a successful update
#[derive(Debug, Clone)]
pub struct UpdatedDrawing {
    pub summary: DrawingSummary,
    pub attachments: UploadReport,
}

/// A drawing reconstituted from the stores
#[derive(Debug, Clone)]
pub struct LoadedDrawing {
    pub scene: Scene,
    pub session: DrawingSession,
    pub summary: DrawingSummary,
    /// Referenced attachments that could not be loaded
    pub missing_attachments: BTreeSet<FileId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Taken,
}

/// Orchestrates the payload codec, the record store and the attachment store
#[derive(Clone)]
pub struct DrawingService {
    records: Arc<dyn RecordStore>,
    attachments: AttachmentClient,
    config: ServiceConfig,
}

impl DrawingService {
    /// The attachment size limit from `config` replaces the client's own
    pub fn new(records: Arc<dyn RecordStore>, attachments: AttachmentClient, config: ServiceConfig) -> Self {
        Self {
            records,
            attachments: attachments.with_max_bytes(config.max_attachment_bytes),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shareable link for a drawing
    pub fn drawing_url(&self, slug: &Slug) -> String {
        format!("{}/d/{}", self.config.public_base_url.trim_end_matches('/'), slug)
    }

    /// Validate free-form input as a slug and check whether it is free
    pub async fn check_availability(&self, slug: &str) -> Result<Availability, DrawingError> {
        let slug = Slug::parse(slug)?;
        if self.records.exists(&slug).await? {
            Ok(Availability::Taken)
        } else {
            Ok(Availability::Available)
        }
    }

    /// Persist a new drawing under `slug` with a freshly generated key
    pub async fn create_drawing(&self, slug: &Slug, scene: &Scene) -> Result<PersistentDrawing, DrawingError> {
        let key = codec::generate_key();
        let payload = codec::encode(scene, &key)?;
        let prepared = self.prepare_attachments(slug, scene, &key)?;

        let record = self.records.create(slug, &payload, &key.to_string()).await?;
        info!(slug = %slug, id = %record.id, "Created drawing");

        let attachments = self.store_attachments(slug, prepared).await;
        if !attachments.is_success() {
            error!(slug = %slug, "Drawing created but attachments were not saved");
            return Err(DrawingError::AttachmentsNotSaved {
                record: record.summary(),
                report: attachments,
            });
        }

        Ok(PersistentDrawing {
            slug: slug.clone(),
            url: self.drawing_url(slug),
            encryption_key: key,
            summary: record.summary(),
            attachments,
        })
    }

    /// Replace a drawing's content, bumping its version.
    ///
    /// `expected_version` turns the last-writer-wins update into a
    /// compare-and-set that fails with `StaleVersion`.
    pub async fn update_drawing(
        &self,
        slug: &Slug,
        scene: &Scene,
        key: &EncryptionKey,
        expected_version: Option<i32>,
    ) -> Result<UpdatedDrawing, DrawingError> {
        let payload = codec::encode(scene, key)?;
        let prepared = self.prepare_attachments(slug, scene, key)?;

        let record = self
            .records
            .update(slug, &payload, &key.to_string(), expected_version)
            .await?;
        info!(slug = %slug, version = record.version, "Updated drawing");

        let attachments = self.store_attachments(slug, prepared).await;
        if !attachments.is_success() {
            error!(slug = %slug, version = record.version, "Drawing updated but attachments were not saved");
            return Err(DrawingError::AttachmentsNotSaved {
                record: record.summary(),
                report: attachments,
            });
        }

        Ok(UpdatedDrawing {
            summary: record.summary(),
            attachments,
        })
    }

    /// Save through a session, guarding against concurrent writers
    pub async fn save(&self, session: &mut DrawingSession, scene: &Scene) -> Result<UpdatedDrawing, DrawingError> {
        match self
            .update_drawing(&session.slug, scene, &session.key, Some(session.version))
            .await
        {
            Ok(updated) => {
                session.version = updated.summary.version;
                Ok(updated)
            }
            Err(DrawingError::AttachmentsNotSaved { record, report }) => {
                // The record did move forward
                session.version = record.version;
                Err(DrawingError::AttachmentsNotSaved { record, report })
            }
            Err(e) => Err(e),
        }
    }

    /// Read, decrypt and reassemble a drawing with whatever attachments load
    pub async fn load_drawing(&self, slug: &Slug) -> Result<LoadedDrawing, DrawingError> {
        let record = self.records.read(slug).await?;

        let key: EncryptionKey = record.encryption_key.parse().map_err(|e| {
            error!(slug = %slug, "Stored encryption key is malformed");
            DrawingError::Codec(e)
        })?;
        let decoded = codec::decode(&record.encrypted_payload, &key).map_err(|e| {
            error!(slug = %slug, version = record.version, "Failed to decode drawing: {}", e);
            DrawingError::Codec(e)
        })?;

        let mut scene = decoded.into_scene().restore();
        let wanted = scene.referenced_file_ids();
        let mut missing_attachments = BTreeSet::new();

        if !wanted.is_empty() {
            let scope = AttachmentScope::for_slug(slug);
            let result = self.attachments.download(&scope, &key, &wanted).await;
            if !result.errored.is_empty() {
                warn!(
                    slug = %slug,
                    missing = result.errored.len(),
                    "Loaded drawing with missing attachments"
                );
            }
            scene.files.extend(result.loaded);
            missing_attachments = result.errored;
        }

        debug!(slug = %slug, version = record.version, elements = scene.elements.len(), "Loaded drawing");

        Ok(LoadedDrawing {
            scene,
            session: DrawingSession {
                slug: slug.clone(),
                key,
                version: record.version,
            },
            summary: record.summary(),
            missing_attachments,
        })
    }

    fn prepare_attachments(
        &self,
        slug: &Slug,
        scene: &Scene,
        key: &EncryptionKey,
    ) -> Result<PreparedUpload, DrawingError> {
        let files = scene.referenced_files();
        let prepared = self
            .attachments
            .prepare(files.into_values(), key, self.config.oversize_policy);

        if prepared.is_aborted() {
            let detail = prepared
                .report()
                .rejected
                .iter()
                .map(|(id, reason)| format!("{}: {}", id, reason))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(slug = %slug, "Rejected drawing with unusable attachments: {}", detail);
            return Err(DrawingError::Validation(detail));
        }
        Ok(prepared)
    }

    async fn store_attachments(&self, slug: &Slug, prepared: PreparedUpload) -> UploadReport {
        if prepared.is_empty() {
            return prepared.report().clone();
        }
        self.attachments.put(&AttachmentScope::for_slug(slug), prepared).await
    }
}
