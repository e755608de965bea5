//! In-memory stores for tests.
//!
//! They follow the Postgres repositories' semantics closely enough for the queue,
//! pipeline and HTTP tests: attempt-guarded job updates, monotonic progress, metadata
//! upserts keyed by (asset, field) and `title` renaming.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use damflow_core::constants::metadata_fields;
use damflow_core::models::{
    Asset, AssetMetadataEntry, AssetSearch, AssetSearchPage, AssetStatus, Job, JobKind, JobState, MetadataField,
    MetadataFieldType, MetadataPair, MetadataValue, NewAsset, NewJob,
};
use damflow_core::{AppError, GroupMembership, GroupPermission};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::store::{AssetStore, JobStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct AssetState {
    assets: HashMap<Uuid, Asset>,
    fields: Vec<MetadataField>,
    values: BTreeMap<(Uuid, i64), (String, DateTime<Utc>)>,
}

impl AssetState {
    fn field_id(&mut self, name: &str) -> i64 {
        if let Some(field) = self.fields.iter().find(|f| f.name == name) {
            return field.id;
        }
        let id = self.fields.len() as i64 + 1;
        self.fields.push(MetadataField {
            id,
            name: name.to_string(),
            field_type: MetadataFieldType::Text,
            options: None,
            created_at: Utc::now(),
        });
        id
    }

    fn set_value(&mut self, asset_id: Uuid, field_id: i64, field_name: &str, value: &str) {
        let now = Utc::now();
        self.values
            .insert((asset_id, field_id), (value.to_string(), now));
        if field_name == metadata_fields::TITLE {
            if let Some(asset) = self.assets.get_mut(&asset_id) {
                asset.filename = value.to_string();
                asset.updated_at = now;
            }
        }
    }

    fn insert_asset(&mut self, asset: NewAsset) -> Asset {
        let now = Utc::now();
        let created_at = self
            .assets
            .get(&asset.id)
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let stored = Asset {
            id: asset.id,
            filename: asset.filename,
            original_filename: asset.original_filename,
            stored_filename: asset.stored_filename,
            file_type: asset.file_type,
            file_size: asset.file_size,
            path: asset.path,
            thumbnail: asset.thumbnail,
            storage_tier: asset.storage_tier,
            keywords: asset.keywords,
            status: AssetStatus::Active,
            owner_user_id: asset.owner_user_id,
            group_id: asset.group_id,
            created_at,
            updated_at: now,
        };
        self.assets.insert(stored.id, stored.clone());
        stored
    }

    fn write_pairs(&mut self, asset_id: Uuid, pairs: &[MetadataPair]) {
        for pair in pairs {
            let value = pair.value.trim();
            if value.is_empty() {
                continue;
            }
            let field_id = self.field_id(&pair.name);
            self.set_value(asset_id, field_id, &pair.name, value);
        }
    }
}

/// Asset store backed by a hash map, with injectable write failures.
#[derive(Default)]
pub struct MemoryAssetStore {
    state: Mutex<AssetState>,
    failing_creates: AtomicU32,
    failing_metadata_writes: AtomicU32,
}

/// Consumes one injected failure, if any are left.
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` asset inserts fail with a database style error.
    pub fn fail_next_creates(&self, count: u32) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// The next `count` metadata writes fail. A failing write inside
    /// `create_asset_with_metadata` leaves no asset behind.
    pub fn fail_next_metadata_writes(&self, count: u32) {
        self.failing_metadata_writes.store(count, Ordering::SeqCst);
    }

    /// Inserts a fully formed asset, bypassing the pipeline.
    pub fn insert(&self, asset: Asset) {
        lock(&self.state).assets.insert(asset.id, asset);
    }

    pub fn assets(&self) -> Vec<Asset> {
        lock(&self.state).assets.values().cloned().collect()
    }

    /// Current value of the named field on an asset.
    pub fn metadata_value(&self, asset_id: Uuid, name: &str) -> Option<String> {
        let state = lock(&self.state);
        let field = state.fields.iter().find(|f| f.name == name)?;
        state
            .values
            .get(&(asset_id, field.id))
            .map(|(value, _)| value.clone())
    }

    /// Number of stored (asset, field) values for an asset.
    pub fn metadata_count(&self, asset_id: Uuid) -> usize {
        lock(&self.state)
            .values
            .keys()
            .filter(|(id, _)| *id == asset_id)
            .count()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn create_asset(&self, asset: NewAsset) -> Result<Asset, AppError> {
        if take_failure(&self.failing_creates) {
            return Err(AppError::Internal("injected create_asset failure".to_string()));
        }
        Ok(lock(&self.state).insert_asset(asset))
    }

    async fn create_asset_with_metadata(
        &self,
        asset: NewAsset,
        pairs: &[MetadataPair],
    ) -> Result<Asset, AppError> {
        if take_failure(&self.failing_creates) {
            return Err(AppError::Internal("injected create_asset failure".to_string()));
        }
        if take_failure(&self.failing_metadata_writes) {
            return Err(AppError::Internal("injected metadata write failure".to_string()));
        }
        let mut state = lock(&self.state);
        let id = asset.id;
        state.insert_asset(asset);
        state.write_pairs(id, pairs);
        state
            .assets
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("Asset {} vanished during insert", id)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        Ok(lock(&self.state).assets.get(&id).cloned())
    }

    async fn find_all_accessible(
        &self,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Asset>, AppError> {
        let mut assets: Vec<Asset> = lock(&self.state)
            .assets
            .values()
            .filter(|a| a.is_active())
            .filter(|a| {
                a.owner_user_id == user_id
                    || a.group_id.map(|g| group_ids.contains(&g)).unwrap_or(false)
            })
            .cloned()
            .collect();
        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(assets)
    }

    async fn search(
        &self,
        user_id: i64,
        group_ids: &[i64],
        search: &AssetSearch,
    ) -> Result<AssetSearchPage, AppError> {
        let mut matched = self.find_all_accessible(user_id, group_ids).await?;
        matched.retain(|a| search.matches(a));
        matched.sort_by(|a, b| search.compare(a, b));
        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(usize::try_from(search.offset()).unwrap_or(usize::MAX))
            .take(search.limit as usize)
            .collect();
        Ok(AssetSearchPage::new(page, total, search))
    }

    async fn upsert_metadata(
        &self,
        asset_id: Uuid,
        pairs: &[MetadataPair],
    ) -> Result<(), AppError> {
        if take_failure(&self.failing_metadata_writes) {
            return Err(AppError::Internal("injected metadata write failure".to_string()));
        }
        let mut state = lock(&self.state);
        if !state.assets.contains_key(&asset_id) {
            return Err(AppError::NotFound(format!("Asset {} not found", asset_id)));
        }
        state.write_pairs(asset_id, pairs);
        Ok(())
    }

    async fn save_metadata_values(
        &self,
        asset_id: Uuid,
        values: &[MetadataValue],
    ) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if !state.assets.contains_key(&asset_id) {
            return Err(AppError::NotFound(format!("Asset {} not found", asset_id)));
        }
        // Validate every field before writing so a bad id leaves nothing behind.
        let mut resolved = Vec::with_capacity(values.len());
        for entry in values {
            let name = state
                .fields
                .iter()
                .find(|f| f.id == entry.field_id)
                .map(|f| f.name.clone())
                .ok_or_else(|| {
                    AppError::NotFound(format!("Metadata field {} not found", entry.field_id))
                })?;
            resolved.push((entry.field_id, name, entry.value.trim().to_string()));
        }
        for (field_id, name, value) in resolved {
            if !value.is_empty() {
                state.set_value(asset_id, field_id, &name, &value);
            }
        }
        Ok(())
    }

    async fn list_metadata(&self, asset_id: Uuid) -> Result<Vec<AssetMetadataEntry>, AppError> {
        let state = lock(&self.state);
        let mut entries: Vec<AssetMetadataEntry> = state
            .values
            .iter()
            .filter(|((id, _), _)| *id == asset_id)
            .filter_map(|((id, field_id), (value, updated_at))| {
                let field = state.fields.iter().find(|f| f.id == *field_id)?;
                Some(AssetMetadataEntry {
                    asset_id: *id,
                    field_id: *field_id,
                    field_name: field.name.clone(),
                    value: value.clone(),
                    updated_at: *updated_at,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.field_name.cmp(&b.field_name));
        Ok(entries)
    }

    async fn list_metadata_fields(&self) -> Result<Vec<MetadataField>, AppError> {
        Ok(lock(&self.state).fields.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = lock(&self.state);
        match state.assets.get_mut(&id) {
            Some(asset) if asset.is_active() => {
                asset.status = AssetStatus::Deleted;
                asset.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Job store backed by a hash map.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<Job> {
        lock(&self.jobs).values().cloned().collect()
    }

    /// Overwrites `started_at`, to simulate a worker that died mid-job.
    pub fn set_started_at(&self, id: Uuid, started_at: DateTime<Utc>) {
        if let Some(job) = lock(&self.jobs).get_mut(&id) {
            job.started_at = Some(started_at);
        }
    }

    /// Overwrites `finished_at`, to age a finished job.
    pub fn set_finished_at(&self, id: Uuid, finished_at: DateTime<Utc>) {
        if let Some(job) = lock(&self.jobs).get_mut(&id) {
            job.finished_at = Some(finished_at);
        }
    }

    fn update_owned<F>(&self, id: Uuid, attempt: i32, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = lock(&self.jobs);
        let job = jobs.get_mut(&id)?;
        if job.state != JobState::Active || job.attempts != attempt {
            return None;
        }
        f(job);
        job.updated_at = Utc::now();
        Some(job.clone())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, new_job: NewJob) -> anyhow::Result<Job> {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            kind: new_job.kind,
            payload: new_job.payload,
            state: JobState::Waiting,
            progress: 0,
            attempts: 0,
            max_attempts: new_job.policy.attempts.max(1) as i32,
            backoff: new_job.policy.backoff,
            result: None,
            failed_reason: None,
            remove_on_complete: new_job.policy.remove_on_complete,
            remove_on_fail: new_job.policy.remove_on_fail,
            run_at: now,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.jobs).insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> anyhow::Result<Option<Job>> {
        Ok(lock(&self.jobs).get(&id).cloned())
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> anyhow::Result<Option<Job>> {
        let now = Utc::now();
        let mut jobs = lock(&self.jobs);
        let next = jobs
            .values()
            .filter(|j| j.state == JobState::Waiting && j.run_at <= now && kinds.contains(&j.kind))
            .min_by_key(|j| (j.run_at, j.created_at))
            .map(|j| j.id);

        Ok(next.and_then(|id| {
            let job = jobs.get_mut(&id)?;
            job.state = JobState::Active;
            job.attempts += 1;
            job.progress = 0;
            job.started_at = Some(now);
            job.updated_at = now;
            Some(job.clone())
        }))
    }

    async fn update_progress(&self, id: Uuid, attempt: i32, progress: i32) -> anyhow::Result<bool> {
        Ok(self
            .update_owned(id, attempt, |job| {
                job.progress = job.progress.max(progress.clamp(0, 100));
            })
            .is_some())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        attempt: i32,
        result: serde_json::Value,
    ) -> anyhow::Result<Option<Job>> {
        Ok(self.update_owned(id, attempt, |job| {
            job.state = JobState::Completed;
            job.progress = 100;
            job.result = Some(result);
            job.failed_reason = None;
            job.finished_at = Some(Utc::now());
        }))
    }

    async fn mark_failed(&self, id: Uuid, attempt: i32, reason: &str) -> anyhow::Result<Option<Job>> {
        Ok(self.update_owned(id, attempt, |job| {
            job.state = JobState::Failed;
            job.failed_reason = Some(reason.to_string());
            job.finished_at = Some(Utc::now());
        }))
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        attempt: i32,
        reason: &str,
        run_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<Job>> {
        Ok(self.update_owned(id, attempt, |job| {
            job.state = JobState::Waiting;
            job.failed_reason = Some(reason.to_string());
            job.run_at = run_at;
            job.started_at = None;
        }))
    }

    async fn delete_job(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(lock(&self.jobs).remove(&id).is_some())
    }

    async fn requeue_stale(&self, started_before: DateTime<Utc>) -> anyhow::Result<u64> {
        let now = Utc::now();
        let mut touched = 0;
        for job in lock(&self.jobs).values_mut() {
            let stale = job.state == JobState::Active
                && job.started_at.map(|t| t < started_before).unwrap_or(false);
            if !stale {
                continue;
            }
            if job.attempts >= job.max_attempts {
                job.state = JobState::Failed;
                job.failed_reason = Some("worker stopped responding".to_string());
                job.finished_at = Some(now);
            } else {
                job.state = JobState::Waiting;
                job.run_at = now;
                job.started_at = None;
            }
            job.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn purge_finished(&self, finished_before: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.state.is_finished()
                && job.finished_at.map(|t| t < finished_before).unwrap_or(false))
        });
        Ok((before - jobs.len()) as u64)
    }
}

/// Membership table fixed at construction.
#[derive(Default)]
pub struct StaticMembership {
    members: HashMap<(i64, i64), GroupPermission>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, group_id: i64, user_id: i64, permission: GroupPermission) -> Self {
        self.members.insert((group_id, user_id), permission);
        self
    }
}

#[async_trait]
impl GroupMembership for StaticMembership {
    async fn permission(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupPermission>, AppError> {
        Ok(self.members.get(&(group_id, user_id)).copied())
    }

    async fn groups_for_user(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let mut groups: Vec<i64> = self
            .members
            .keys()
            .filter(|(_, user)| *user == user_id)
            .map(|(group, _)| *group)
            .collect();
        groups.sort_unstable();
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use damflow_core::models::{Backoff, RetryPolicy};
    use damflow_core::StorageTier;

    fn new_asset(id: Uuid, owner: i64, group: Option<i64>) -> NewAsset {
        NewAsset {
            id,
            filename: "photo.png".to_string(),
            original_filename: "photo.png".to_string(),
            stored_filename: "photo-1-1.png".to_string(),
            file_type: "image/png".to_string(),
            file_size: 10,
            path: "uploads/photo-1-1.png".to_string(),
            thumbnail: Some("uploads/thumbnails/thumb_photo-1-1.png".to_string()),
            storage_tier: StorageTier::Storage1,
            keywords: vec![],
            owner_user_id: owner,
            group_id: group,
        }
    }

    fn new_job(kind: JobKind, attempts: u32) -> NewJob {
        NewJob {
            kind,
            payload: serde_json::json!({}),
            policy: RetryPolicy {
                attempts,
                backoff: Backoff::Fixed { delay_ms: 0 },
                ..RetryPolicy::default()
            },
        }
    }

    #[tokio::test]
    async fn test_create_asset_is_idempotent_per_id() {
        let store = MemoryAssetStore::new();
        let id = Uuid::new_v4();
        store.create_asset(new_asset(id, 1, None)).await.unwrap();
        store.create_asset(new_asset(id, 1, None)).await.unwrap();
        assert_eq!(store.assets().len(), 1);
    }

    #[tokio::test]
    async fn test_create_with_metadata_is_all_or_nothing() {
        let store = MemoryAssetStore::new();
        let id = Uuid::new_v4();
        let pairs = [
            MetadataPair::new("title", "Harbour"),
            MetadataPair::new("category", "image/png"),
        ];

        store.fail_next_metadata_writes(1);
        let result = store
            .create_asset_with_metadata(new_asset(id, 1, None), &pairs)
            .await;
        assert!(result.is_err());
        assert!(store.assets().is_empty());
        assert_eq!(store.metadata_count(id), 0);

        let asset = store
            .create_asset_with_metadata(new_asset(id, 1, None), &pairs)
            .await
            .unwrap();
        assert_eq!(asset.filename, "Harbour");
        assert_eq!(store.metadata_count(id), 2);
    }

    #[tokio::test]
    async fn test_metadata_upsert_keeps_latest_value() {
        let store = MemoryAssetStore::new();
        let id = Uuid::new_v4();
        store.create_asset(new_asset(id, 1, None)).await.unwrap();

        store
            .upsert_metadata(id, &[MetadataPair::new("category", "image/png")])
            .await
            .unwrap();
        store
            .upsert_metadata(
                id,
                &[
                    MetadataPair::new("category", "image/jpeg"),
                    MetadataPair::new("description", "  "),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.metadata_count(id), 1);
        assert_eq!(store.metadata_value(id, "category").as_deref(), Some("image/jpeg"));
        assert_eq!(store.list_metadata_fields().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_title_renames_asset() {
        let store = MemoryAssetStore::new();
        let id = Uuid::new_v4();
        store.create_asset(new_asset(id, 1, None)).await.unwrap();
        store
            .upsert_metadata(id, &[MetadataPair::new("title", "Sunset")])
            .await
            .unwrap();
        let asset = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(asset.filename, "Sunset");
    }

    #[tokio::test]
    async fn test_save_values_rejects_unknown_field() {
        let store = MemoryAssetStore::new();
        let id = Uuid::new_v4();
        store.create_asset(new_asset(id, 1, None)).await.unwrap();
        let result = store
            .save_metadata_values(
                id,
                &[MetadataValue {
                    field_id: 42,
                    value: "x".to_string(),
                }],
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_accessible_listing_excludes_deleted_and_foreign() {
        let store = MemoryAssetStore::new();
        let own = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        store.create_asset(new_asset(own, 1, None)).await.unwrap();
        store.create_asset(new_asset(shared, 2, Some(10))).await.unwrap();
        store.create_asset(new_asset(foreign, 3, Some(11))).await.unwrap();

        let visible = store.find_all_accessible(1, &[10]).await.unwrap();
        assert_eq!(visible.len(), 2);

        assert!(store.soft_delete(own).await.unwrap());
        assert!(!store.soft_delete(own).await.unwrap());
        let visible = store.find_all_accessible(1, &[10]).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, shared);
    }

    #[tokio::test]
    async fn test_search_filters_and_pages_visible_assets() {
        let store = MemoryAssetStore::new();
        for (name, size) in [("Harbour at dusk", 30), ("harbour crane", 10), ("Mountain", 20)] {
            let mut asset = new_asset(Uuid::new_v4(), 1, None);
            asset.filename = name.to_string();
            asset.file_size = size;
            asset.keywords = vec!["Sea".to_string()];
            store.create_asset(asset).await.unwrap();
        }
        store
            .create_asset(new_asset(Uuid::new_v4(), 2, Some(11)))
            .await
            .unwrap();

        let search = AssetSearch {
            name: Some("HARBOUR".to_string()),
            keywords: vec!["sea".to_string()],
            sort_by: damflow_core::models::AssetSortField::Size,
            order: damflow_core::models::SortOrder::Asc,
            limit: 1,
            page: 2,
            ..AssetSearch::default()
        };
        let page = store.search(1, &[], &search).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].filename, "Harbour at dusk");

        let foreign = store.search(1, &[], &AssetSearch::default()).await.unwrap();
        assert_eq!(foreign.pagination.total, 3);
    }

    #[tokio::test]
    async fn test_stale_updates_are_ignored_after_reclaim() {
        let store = MemoryJobStore::new();
        let job = store.create_job(new_job(JobKind::Image, 3)).await.unwrap();

        let first = store.claim_next(&[JobKind::Image]).await.unwrap().unwrap();
        assert_eq!(first.attempts, 1);
        store.set_started_at(job.id, Utc::now() - chrono::Duration::hours(2));
        assert_eq!(
            store.requeue_stale(Utc::now() - chrono::Duration::hours(1)).await.unwrap(),
            1
        );

        let second = store.claim_next(&[JobKind::Image]).await.unwrap().unwrap();
        assert_eq!(second.attempts, 2);

        // The first attempt can no longer write.
        assert!(!store.update_progress(job.id, 1, 50).await.unwrap());
        assert!(store
            .mark_completed(job.id, 1, serde_json::json!({}))
            .await
            .unwrap()
            .is_none());
        assert!(store.update_progress(job.id, 2, 50).await.unwrap());
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = MemoryJobStore::new();
        let job = store.create_job(new_job(JobKind::Video, 1)).await.unwrap();
        store.claim_next(&[JobKind::Video]).await.unwrap();

        store.update_progress(job.id, 1, 60).await.unwrap();
        store.update_progress(job.id, 1, 20).await.unwrap();
        store.update_progress(job.id, 1, 250).await.unwrap();
        let job = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.progress, 100);
    }

    #[tokio::test]
    async fn test_claim_respects_kinds_and_run_at() {
        let store = MemoryJobStore::new();
        let job = store.create_job(new_job(JobKind::Cleanup, 2)).await.unwrap();

        assert!(store.claim_next(&[JobKind::Image]).await.unwrap().is_none());
        store.claim_next(&[JobKind::Cleanup]).await.unwrap().unwrap();
        store
            .schedule_retry(job.id, 1, "boom", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap()
            .unwrap();
        assert!(store.claim_next(&[JobKind::Cleanup]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_only_old_finished_jobs() {
        let store = MemoryJobStore::new();
        let done = store.create_job(new_job(JobKind::Image, 1)).await.unwrap();
        let waiting = store.create_job(new_job(JobKind::Video, 1)).await.unwrap();
        store.claim_next(&[JobKind::Image]).await.unwrap();
        store
            .mark_completed(done.id, 1, serde_json::json!({}))
            .await
            .unwrap();
        store.set_finished_at(done.id, Utc::now() - chrono::Duration::days(10));

        let purged = store
            .purge_finished(Utc::now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.get_job(done.id).await.unwrap().is_none());
        assert!(store.get_job(waiting.id).await.unwrap().is_some());
    }
}
