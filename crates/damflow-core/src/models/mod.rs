pub mod asset;
pub mod job;
pub mod metadata;
pub mod payload;
pub mod search;
pub mod upload;

pub use asset::{Asset, AssetStatus, MediaClass, NewAsset};
pub use job::{Backoff, Job, JobKind, JobState, JobStatus, NewJob, RetryPolicy};
pub use metadata::{AssetMetadataEntry, MetadataField, MetadataFieldType, MetadataPair, MetadataValue};
pub use payload::{
    AssetJobPayload, AssetJobResult, CleanupPayload, CleanupResult, SoftDeleteFailure,
    SoftDeletePayload, SoftDeleteResult, UploadedFile,
};
pub use search::{AssetSearch, AssetSearchPage, AssetSortField, AssetTypeFilter, Pagination, SortOrder};
pub use upload::UploadReceipt;
