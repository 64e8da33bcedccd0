//! Domain types shared by the GC job and its repositories.
//!
//! Mirrors the shape of the Harbor `blob`/`artifactrash`/`project`/`artifact`
//! tables: numeric surrogate keys, content-addressed digests, and a small
//! enum-backed status column on `blob`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Lifecycle status of a blob row, enforced only via conditional updates
/// (see [`crate::db::repositories::BlobRepository::update_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BlobStatus {
    None,
    Delete,
    Deleting,
    #[sqlx(rename = "delete_failed")]
    DeleteFailed,
}

impl std::fmt::Display for BlobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlobStatus::None => "none",
            BlobStatus::Delete => "delete",
            BlobStatus::Deleting => "deleting",
            BlobStatus::DeleteFailed => "delete_failed",
        };
        f.write_str(s)
    }
}

/// What a blob's bytes represent. Foreign layers are never physically
/// deleted: their payload lives on an external URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BlobContentKind {
    Manifest,
    #[sqlx(rename = "foreign_layer")]
    ForeignLayer,
    #[sqlx(rename = "regular_layer")]
    RegularLayer,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Blob {
    pub id: i64,
    pub digest: String,
    pub media_type: String,
    pub size: i64,
    pub content_kind: BlobContentKind,
    pub status: BlobStatus,
    pub update_time: OffsetDateTime,
}

impl Blob {
    pub fn is_manifest(&self) -> bool {
        self.content_kind == BlobContentKind::Manifest
    }

    pub fn is_foreign_layer(&self) -> bool {
        self.content_kind == BlobContentKind::ForeignLayer
    }
}

/// A record of an artifact that was (or, in dry-run, would have been)
/// deleted. Kept around until its manifest has been removed from every
/// repository it lived in.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ArtifactTrash {
    pub id: i64,
    pub repository_name: String,
    pub digest: String,
    pub manifest_media_type: String,
    pub media_type: String,
    pub creation_time: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub project_id: i64,
    pub repository_name: String,
    pub digest: String,
    pub manifest_media_type: String,
    pub media_type: String,
    /// Empty ⇔ untagged.
    pub tags: Vec<String>,
}

impl Artifact {
    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }
}
