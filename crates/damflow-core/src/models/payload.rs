//! Typed job payloads and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage_types::StorageTier;

/// A file received from a client and written under a tier's `uploads/` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub original_name: String,
    /// Unique name on disk
    pub stored_name: String,
    /// Absolute location of the stored file
    pub path: PathBuf,
    pub mime_type: String,
    pub size: u64,
    /// Lowercase hex SHA-256 computed on receipt
    pub checksum: String,
}

/// Payload of image, video and document jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetJobPayload {
    pub file: UploadedFile,
    pub owner_user_id: i64,
    pub group_id: Option<i64>,
    pub storage_tier: StorageTier,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form metadata supplied with the upload
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub uploaded_at: DateTime<Utc>,
}

impl AssetJobPayload {
    /// Keywords split on commas, trimmed, empties dropped.
    pub fn keyword_list(&self) -> Vec<String> {
        super::search::AssetSearch::parse_keywords(self.keywords.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssetJobResult {
    pub asset_id: Uuid,
    pub storage_tier: StorageTier,
    pub relative_path: String,
    pub preview_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupPayload {
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    pub deleted: usize,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftDeletePayload {
    pub asset_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteFailure {
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteResult {
    pub deleted: Vec<Uuid>,
    pub not_found: Vec<Uuid>,
    pub failed: Vec<SoftDeleteFailure>,
}
