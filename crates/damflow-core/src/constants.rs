//! Shared constants

/// Attempts made for a job before it is left in the failed state.
pub const DEFAULT_JOB_ATTEMPTS: u32 = 3;

/// Base delay for exponential retry backoff.
pub const DEFAULT_JOB_BACKOFF_MS: u64 = 5000;

/// Header carrying the authenticated user id, set by the upstream auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the comma separated group ids of the authenticated user.
pub const GROUP_IDS_HEADER: &str = "x-group-ids";

/// Metadata field names written by the asset pipeline.
pub mod metadata_fields {
    pub const ASSET_CODE: &str = "asset_code";
    pub const CATEGORY: &str = "category";
    pub const TITLE: &str = "title";
    pub const KEYWORDS: &str = "keywords";
    pub const DESCRIPTION: &str = "description";
    pub const CREATED_DATE: &str = "created_date";
}
