use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage_types::StorageTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Active,
    Deleted,
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetStatus::Active => write!(f, "active"),
            AssetStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl FromStr for AssetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AssetStatus::Active),
            "deleted" => Ok(AssetStatus::Deleted),
            _ => Err(anyhow::anyhow!("Invalid asset status: {}", s)),
        }
    }
}

/// Broad media family used to pick a preview generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaClass {
    Image,
    Video,
    Document,
}

impl MediaClass {
    /// Classifies by declared MIME type. Anything that is not `image/*` or `video/*`
    /// is treated as a document, which falls back to a placeholder preview.
    pub fn classify(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaClass::Image
        } else if mime.starts_with("video/") {
            MediaClass::Video
        } else {
            MediaClass::Document
        }
    }
}

impl Display for MediaClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaClass::Image => write!(f, "image"),
            MediaClass::Video => write!(f, "video"),
            MediaClass::Document => write!(f, "document"),
        }
    }
}

/// A catalogued file. Created only by a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    pub id: Uuid,
    /// Display name, replaced when a `title` metadata value is saved
    pub filename: String,
    pub original_filename: String,
    pub stored_filename: String,
    /// MIME type
    pub file_type: String,
    pub file_size: i64,
    /// Path of the original, relative to the tier directory
    pub path: String,
    /// Path of the preview, relative to the tier directory
    pub thumbnail: Option<String>,
    pub storage_tier: StorageTier,
    pub keywords: Vec<String>,
    pub status: AssetStatus,
    pub owner_user_id: i64,
    pub group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Asset {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Asset {
            id: row.try_get("id")?,
            filename: row.try_get("filename")?,
            original_filename: row.try_get("original_filename")?,
            stored_filename: row.try_get("stored_filename")?,
            file_type: row.try_get("file_type")?,
            file_size: row.try_get("file_size")?,
            path: row.try_get("path")?,
            thumbnail: row.try_get("thumbnail")?,
            storage_tier: row
                .try_get::<String, _>("storage_tier")?
                .parse()
                .map_err(|e| {
                    sqlx::Error::Decode(format!("Failed to parse storage_tier: {}", e).into())
                })?,
            keywords: row.try_get("keywords")?,
            status: row.try_get::<String, _>("status")?.parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse status: {}", e).into())
            })?,
            owner_user_id: row.try_get("owner_user_id")?,
            group_id: row.try_get("group_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Asset {
    pub fn is_active(&self) -> bool {
        self.status == AssetStatus::Active
    }
}

/// Attributes for a new asset row.
///
/// The id is chosen by the caller so that re-running the same job writes the same row.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub path: String,
    pub thumbnail: Option<String>,
    pub storage_tier: StorageTier,
    pub keywords: Vec<String>,
    pub owner_user_id: i64,
    pub group_id: Option<i64>,
}
