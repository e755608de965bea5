//! Asset search filters and paged results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use utoipa::ToSchema;

use super::asset::Asset;

/// Media family accepted by the `type` search filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetTypeFilter {
    #[default]
    All,
    Image,
    Video,
    Audio,
    /// Anything that is not image, video or audio
    Document,
}

impl AssetTypeFilter {
    const MEDIA_PREFIXES: [&'static str; 3] = ["image/", "video/", "audio/"];

    /// MIME prefix an asset must carry, if the filter is a single prefix.
    pub fn mime_prefix(&self) -> Option<&'static str> {
        match self {
            AssetTypeFilter::Image => Some("image/"),
            AssetTypeFilter::Video => Some("video/"),
            AssetTypeFilter::Audio => Some("audio/"),
            AssetTypeFilter::All | AssetTypeFilter::Document => None,
        }
    }

    pub fn matches(&self, mime_type: &str) -> bool {
        let mime = mime_type.to_ascii_lowercase();
        match self {
            AssetTypeFilter::All => true,
            AssetTypeFilter::Document => !Self::MEDIA_PREFIXES
                .iter()
                .any(|prefix| mime.starts_with(prefix)),
            other => other
                .mime_prefix()
                .map(|prefix| mime.starts_with(prefix))
                .unwrap_or(false),
        }
    }
}

impl FromStr for AssetTypeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(AssetTypeFilter::All),
            "image" => Ok(AssetTypeFilter::Image),
            "video" => Ok(AssetTypeFilter::Video),
            "audio" => Ok(AssetTypeFilter::Audio),
            "document" => Ok(AssetTypeFilter::Document),
            _ => Err(anyhow::anyhow!("Invalid asset type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetSortField {
    Name,
    CreatedAt,
    #[default]
    UpdatedAt,
    Size,
}

impl AssetSortField {
    pub fn column(&self) -> &'static str {
        match self {
            AssetSortField::Name => "filename",
            AssetSortField::CreatedAt => "created_at",
            AssetSortField::UpdatedAt => "updated_at",
            AssetSortField::Size => "file_size",
        }
    }
}

impl FromStr for AssetSortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "name" | "filename" => Ok(AssetSortField::Name),
            "created_at" | "createdAt" => Ok(AssetSortField::CreatedAt),
            "updated_at" | "updatedAt" => Ok(AssetSortField::UpdatedAt),
            "size" | "file_size" => Ok(AssetSortField::Size),
            _ => Err(anyhow::anyhow!("Invalid sort field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[serde(alias = "asc")]
    Asc,
    #[default]
    #[serde(alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(anyhow::anyhow!("Invalid sort order: {}", s)),
        }
    }
}

/// Filters for a search over the assets a caller may see.
///
/// Text filters are case-insensitive substring matches. The date range applies to
/// `updated_at` and is inclusive at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSearch {
    pub name: Option<String>,
    pub file_type: AssetTypeFilter,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    /// An asset matches when any of its keywords contains any of these
    pub keywords: Vec<String>,
    pub sort_by: AssetSortField,
    pub order: SortOrder,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl Default for AssetSearch {
    fn default() -> Self {
        Self {
            name: None,
            file_type: AssetTypeFilter::All,
            from_date: None,
            to_date: None,
            keywords: Vec::new(),
            sort_by: AssetSortField::UpdatedAt,
            order: SortOrder::Desc,
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

impl AssetSearch {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Splits a comma-separated keyword list, dropping blank entries.
    pub fn parse_keywords(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.limit)
    }

    /// `ILIKE` pattern for the name filter, with wildcards in the input escaped.
    pub fn name_pattern(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(contains_pattern)
    }

    pub fn keyword_patterns(&self) -> Vec<String> {
        self.keywords.iter().map(|k| contains_pattern(k)).collect()
    }

    /// Applies every filter except access control to one asset.
    pub fn matches(&self, asset: &Asset) -> bool {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if !contains_ignore_case(&asset.filename, name) {
                return false;
            }
        }
        if !self.file_type.matches(&asset.file_type) {
            return false;
        }
        if self.from_date.is_some_and(|from| asset.updated_at < from) {
            return false;
        }
        if self.to_date.is_some_and(|to| asset.updated_at > to) {
            return false;
        }
        self.keywords.is_empty()
            || self.keywords.iter().any(|wanted| {
                asset
                    .keywords
                    .iter()
                    .any(|keyword| contains_ignore_case(keyword, wanted))
            })
    }

    /// Result order: the requested field, then id, both in the requested direction.
    pub fn compare(&self, a: &Asset, b: &Asset) -> Ordering {
        let ordering = match self.sort_by {
            AssetSortField::Name => a.filename.cmp(&b.filename),
            AssetSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            AssetSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            AssetSortField::Size => a.file_size.cmp(&b.file_size),
        }
        .then_with(|| a.id.cmp(&b.id));
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetSearchPage {
    pub data: Vec<Asset>,
    pub pagination: Pagination,
}

impl AssetSearchPage {
    pub fn new(data: Vec<Asset>, total: i64, search: &AssetSearch) -> Self {
        let limit = i64::from(search.limit.max(1));
        let total_pages = u32::try_from((total.max(0) + limit - 1) / limit).unwrap_or(u32::MAX);
        Self {
            data,
            pagination: Pagination {
                total,
                page: search.page,
                limit: search.limit,
                total_pages,
            },
        }
    }
}
