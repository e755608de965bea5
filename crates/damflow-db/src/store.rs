//! Store traits implemented by the Postgres repositories and the in-memory test stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use damflow_core::models::{
    Asset, AssetMetadataEntry, AssetSearch, AssetSearchPage, Job, JobKind, MetadataField, MetadataPair, MetadataValue,
    NewAsset, NewJob,
};
use damflow_core::AppError;
use uuid::Uuid;

/// Asset records and their metadata.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Inserts the asset as `active`. Re-inserting the same id overwrites the row, which
    /// keeps a retried job from producing a second asset.
    async fn create_asset(&self, asset: NewAsset) -> Result<Asset, AppError>;

    /// [`AssetStore::create_asset`] and [`AssetStore::upsert_metadata`] in a single
    /// transaction: either the active asset and all its metadata are stored, or nothing is.
    async fn create_asset_with_metadata(
        &self,
        asset: NewAsset,
        pairs: &[MetadataPair],
    ) -> Result<Asset, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>, AppError>;

    /// Active assets owned by `user_id` or in any of `group_ids`, newest first.
    async fn find_all_accessible(
        &self,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Asset>, AppError>;

    /// One page of the active assets visible to `user_id` (owned, or in one of
    /// `group_ids`) that pass every filter in `search`, with the total match count.
    async fn search(
        &self,
        user_id: i64,
        group_ids: &[i64],
        search: &AssetSearch,
    ) -> Result<AssetSearchPage, AppError>;

    /// Creates missing fields by name and inserts or updates each value in one
    /// transaction. Empty values are skipped. A `title` pair also renames the asset.
    async fn upsert_metadata(&self, asset_id: Uuid, pairs: &[MetadataPair])
        -> Result<(), AppError>;

    /// Same as [`AssetStore::upsert_metadata`] for fields addressed by id.
    async fn save_metadata_values(
        &self,
        asset_id: Uuid,
        values: &[MetadataValue],
    ) -> Result<(), AppError>;

    async fn list_metadata(&self, asset_id: Uuid) -> Result<Vec<AssetMetadataEntry>, AppError>;

    async fn list_metadata_fields(&self) -> Result<Vec<MetadataField>, AppError>;

    /// Marks an active asset deleted. Returns false when no active asset has this id.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Durable job storage.
///
/// Updates made by a worker carry the attempt number it claimed. Once the job has been
/// reclaimed (after a stale requeue) those updates no longer match and are dropped.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: NewJob) -> anyhow::Result<Job>;

    async fn get_job(&self, id: Uuid) -> anyhow::Result<Option<Job>>;

    /// Claims the oldest runnable waiting job of one of `kinds`: state becomes `active`,
    /// attempts is incremented and progress reset.
    async fn claim_next(&self, kinds: &[JobKind]) -> anyhow::Result<Option<Job>>;

    /// Raises progress to `progress`; lower values leave it unchanged. Returns false when
    /// the attempt no longer owns the job.
    async fn update_progress(&self, id: Uuid, attempt: i32, progress: i32)
        -> anyhow::Result<bool>;

    async fn mark_completed(
        &self,
        id: Uuid,
        attempt: i32,
        result: serde_json::Value,
    ) -> anyhow::Result<Option<Job>>;

    async fn mark_failed(&self, id: Uuid, attempt: i32, reason: &str)
        -> anyhow::Result<Option<Job>>;

    /// Returns the job to `waiting`, runnable from `run_at`.
    async fn schedule_retry(
        &self,
        id: Uuid,
        attempt: i32,
        reason: &str,
        run_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Job>>;

    async fn delete_job(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Active jobs started before `started_before` go back to `waiting`, or to `failed`
    /// when they have no attempts left. Returns the number of jobs touched.
    async fn requeue_stale(&self, started_before: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Deletes completed and failed jobs that finished before `finished_before`.
    async fn purge_finished(&self, finished_before: DateTime<Utc>) -> anyhow::Result<u64>;
}
