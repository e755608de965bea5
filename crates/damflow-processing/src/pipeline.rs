//! Asset pipeline
//!
//! Turns a queued upload into an asset:
//!
//! ```text
//! Received -> Classified -> PreviewGenerated -> Persisted -> Done
//! ```
//!
//! Errors are returned to the job queue, which decides between retrying and failing.
//! The asset row and its metadata are written in one transaction, so a failed attempt
//! leaves no asset behind. The asset id is the job id, so a retried job overwrites the
//! asset written by an earlier attempt instead of adding a second one.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use damflow_core::constants::metadata_fields;
use damflow_core::models::{
    AssetJobPayload, AssetJobResult, Job, MediaClass, MetadataPair, NewAsset,
};
use damflow_core::{JobError, JobResultExt, ProgressReporter, StorageTier, ToolSettings};
use damflow_db::AssetStore;
use damflow_storage::StorageLocator;
use uuid::Uuid;

use crate::preview::{PreviewGenerator, PreviewRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Classified,
    PreviewGenerated,
    Persisted,
    Done,
}

impl PipelineStage {
    /// Progress reported on entering the stage.
    pub fn progress(&self) -> u8 {
        match self {
            PipelineStage::Received => 20,
            PipelineStage::Classified => 30,
            PipelineStage::PreviewGenerated => 60,
            PipelineStage::Persisted => 90,
            PipelineStage::Done => 100,
        }
    }
}

pub struct AssetPipeline {
    assets: Arc<dyn AssetStore>,
    locator: StorageLocator,
    tools: ToolSettings,
}

impl AssetPipeline {
    pub fn new(assets: Arc<dyn AssetStore>, locator: StorageLocator, tools: ToolSettings) -> Self {
        Self {
            assets,
            locator,
            tools,
        }
    }

    async fn enter(&self, stage: PipelineStage, job_id: Uuid, progress: &dyn ProgressReporter) {
        tracing::debug!(job.id = %job_id, stage = ?stage, "Pipeline stage");
        progress.report(stage.progress()).await;
    }

    #[tracing::instrument(skip(self, job, progress), fields(job.id = %job.id, job.kind = %job.kind))]
    pub async fn process(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<AssetJobResult, JobError> {
        let payload = job
            .payload_as::<AssetJobPayload>()
            .context("Malformed asset job payload")
            .fatal()?;
        let file = &payload.file;

        if !tokio::fs::try_exists(&file.path).await.unwrap_or(false) {
            return Err(JobError::fatal(anyhow::anyhow!(
                "Uploaded file {} no longer exists",
                file.path.display()
            )));
        }
        self.enter(PipelineStage::Received, job.id, progress).await;

        let class = MediaClass::classify(&file.mime_type);
        let generator = PreviewGenerator::select(&file.mime_type, &file.original_name);
        tracing::info!(
            job.id = %job.id,
            media_class = %class,
            generator = ?generator,
            mime_type = %file.mime_type,
            "Asset classified"
        );
        self.enter(PipelineStage::Classified, job.id, progress).await;

        let tier = payload.storage_tier;
        let paths = self
            .locator
            .ensure_directories(tier)
            .await
            .context("Failed to prepare tier directories")?;

        let request = PreviewRequest {
            input: &file.path,
            stored_name: &file.stored_name,
            original_name: &file.original_name,
            mime_type: &file.mime_type,
            output_dir: &paths.thumbnails,
        };
        let preview = generator
            .generate(&self.tools, &request)
            .await
            .map_err(|e| {
                JobError::retryable(anyhow::Error::new(e).context("Preview generation failed"))
            })?;

        let relative_path = self.relative(tier, &file.path)?;
        let preview_path = self.relative(tier, &preview)?;
        self.enter(PipelineStage::PreviewGenerated, job.id, progress).await;

        let asset_id = job.id;
        let asset = self
            .assets
            .create_asset_with_metadata(
                NewAsset {
                    id: asset_id,
                    filename: file.original_name.clone(),
                    original_filename: file.original_name.clone(),
                    stored_filename: file.stored_name.clone(),
                    file_type: file.mime_type.clone(),
                    file_size: file.size as i64,
                    path: relative_path.clone(),
                    thumbnail: Some(preview_path.clone()),
                    storage_tier: tier,
                    keywords: payload.keyword_list(),
                    owner_user_id: payload.owner_user_id,
                    group_id: payload.group_id,
                },
                &metadata_pairs(asset_id, &payload),
            )
            .await
            .map_err(|e| {
                JobError::retryable(anyhow::Error::new(e).context("Failed to store asset"))
            })?;
        self.enter(PipelineStage::Persisted, job.id, progress).await;

        tracing::info!(
            job.id = %job.id,
            asset.id = %asset.id,
            tier = %tier,
            path = %relative_path,
            preview = %preview_path,
            "Asset processed"
        );
        self.enter(PipelineStage::Done, job.id, progress).await;

        Ok(AssetJobResult {
            asset_id: asset.id,
            storage_tier: tier,
            relative_path,
            preview_path,
        })
    }

    /// Paths outside the tier mean the payload points somewhere it should not; retrying
    /// cannot fix that.
    fn relative(&self, tier: StorageTier, path: &Path) -> Result<String, JobError> {
        self.locator.relative_path(tier, path).fatal()
    }
}

/// Attributes recorded for every processed asset, followed by the client's own fields.
/// Empty values are dropped.
pub fn metadata_pairs(asset_id: Uuid, payload: &AssetJobPayload) -> Vec<MetadataPair> {
    let keywords = payload.keyword_list().join(", ");
    let mut pairs = vec![
        MetadataPair::new(metadata_fields::ASSET_CODE, asset_id.to_string()),
        MetadataPair::new(metadata_fields::CATEGORY, payload.file.mime_type.clone()),
        MetadataPair::new(metadata_fields::TITLE, payload.file.original_name.clone()),
        MetadataPair::new(metadata_fields::KEYWORDS, keywords),
        MetadataPair::new(
            metadata_fields::DESCRIPTION,
            payload.description.clone().unwrap_or_default(),
        ),
        MetadataPair::new(
            metadata_fields::CREATED_DATE,
            payload.uploaded_at.date_naive().to_string(),
        ),
    ];
    pairs.extend(
        payload
            .fields
            .iter()
            .map(|(name, value)| MetadataPair::new(name.trim(), value.trim())),
    );
    pairs.retain(|p| !p.name.is_empty() && !p.value.trim().is_empty());
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use damflow_core::models::{JobKind, JobState, UploadedFile};
    use damflow_db::memory::MemoryAssetStore;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<u8>>);

    #[async_trait]
    impl ProgressReporter for RecordingProgress {
        async fn report(&self, percent: u8) {
            self.0.lock().unwrap().push(percent);
        }
    }

    struct Fixture {
        _dir: TempDir,
        locator: StorageLocator,
        assets: Arc<MemoryAssetStore>,
        pipeline: AssetPipeline,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let locator = StorageLocator::new(dir.path(), StorageTier::Storage1);
        locator.ensure_directories(StorageTier::Storage1).await.unwrap();
        let assets = Arc::new(MemoryAssetStore::new());
        let pipeline = AssetPipeline::new(assets.clone(), locator.clone(), ToolSettings::default());
        Fixture {
            _dir: dir,
            locator,
            assets,
            pipeline,
        }
    }

    fn payload(path: PathBuf, stored: &str, original: &str, mime: &str) -> AssetJobPayload {
        AssetJobPayload {
            file: UploadedFile {
                original_name: original.to_string(),
                stored_name: stored.to_string(),
                path,
                mime_type: mime.to_string(),
                size: 1234,
                checksum: "00".to_string(),
            },
            owner_user_id: 7,
            group_id: Some(3),
            storage_tier: StorageTier::Storage1,
            keywords: Some("sea, sunset".to_string()),
            description: None,
            fields: BTreeMap::from([("photographer".to_string(), "Ana".to_string())]),
            uploaded_at: Utc.with_ymd_and_hms(2024, 5, 17, 10, 0, 0).unwrap(),
        }
    }

    fn job(kind: JobKind, payload: serde_json::Value) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            kind,
            payload,
            state: JobState::Active,
            progress: 0,
            attempts: 1,
            max_attempts: 3,
            backoff: Default::default(),
            result: None,
            failed_reason: None,
            remove_on_complete: false,
            remove_on_fail: false,
            run_at: now,
            started_at: Some(now),
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn write_png(path: &std::path::Path) {
        DynamicImage::ImageRgb8(RgbImage::new(800, 400))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[tokio::test]
    async fn test_image_upload_becomes_asset() {
        let fx = fixture().await;
        let source = fx.locator.uploads_dir(StorageTier::Storage1).join("photo-1-2.png");
        write_png(&source);
        let job = job(
            JobKind::Image,
            serde_json::to_value(payload(source.clone(), "photo-1-2.png", "photo.png", "image/png"))
                .unwrap(),
        );
        let progress = RecordingProgress::default();

        let result = fx.pipeline.process(&job, &progress).await.unwrap();

        assert_eq!(result.asset_id, job.id);
        assert_eq!(result.relative_path, "uploads/photo-1-2.png");
        assert_eq!(result.preview_path, "uploads/thumbnails/thumb_photo-1-2.png");
        assert!(fx
            .locator
            .full_path(StorageTier::Storage1, &result.preview_path)
            .unwrap()
            .exists());
        assert!(source.exists());

        let asset = fx.assets.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(asset.file_type, "image/png");
        assert_eq!(asset.file_size, 1234);
        assert_eq!(asset.keywords, vec!["sea".to_string(), "sunset".to_string()]);
        assert_eq!(asset.group_id, Some(3));

        assert_eq!(
            fx.assets.metadata_value(job.id, "category").as_deref(),
            Some("image/png")
        );
        assert_eq!(
            fx.assets.metadata_value(job.id, "created_date").as_deref(),
            Some("2024-05-17")
        );
        assert_eq!(
            fx.assets.metadata_value(job.id, "photographer").as_deref(),
            Some("Ana")
        );
        assert!(fx.assets.metadata_value(job.id, "description").is_none());

        assert_eq!(*progress.0.lock().unwrap(), vec![20, 30, 60, 90, 100]);
    }

    #[tokio::test]
    async fn test_unknown_type_gets_placeholder_preview() {
        let fx = fixture().await;
        let source = fx.locator.uploads_dir(StorageTier::Storage1).join("data-1-2.bin");
        std::fs::write(&source, b"\x00\x01\x02").unwrap();
        let job = job(
            JobKind::Document,
            serde_json::to_value(payload(
                source,
                "data-1-2.bin",
                "data.bin",
                "application/octet-stream",
            ))
            .unwrap(),
        );

        let result = fx
            .pipeline
            .process(&job, &damflow_core::progress::NoopProgress)
            .await
            .unwrap();
        assert_eq!(result.preview_path, "uploads/thumbnails/thumb_data-1-2.svg");
    }

    #[tokio::test]
    async fn test_retried_job_keeps_single_asset() {
        let fx = fixture().await;
        let source = fx.locator.uploads_dir(StorageTier::Storage1).join("photo-1-2.png");
        write_png(&source);
        let job = job(
            JobKind::Image,
            serde_json::to_value(payload(source, "photo-1-2.png", "photo.png", "image/png"))
                .unwrap(),
        );

        fx.assets.fail_next_creates(1);
        let err = fx
            .pipeline
            .process(&job, &damflow_core::progress::NoopProgress)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(fx.assets.assets().is_empty());

        fx.pipeline
            .process(&job, &damflow_core::progress::NoopProgress)
            .await
            .unwrap();
        fx.pipeline
            .process(&job, &damflow_core::progress::NoopProgress)
            .await
            .unwrap();
        assert_eq!(fx.assets.assets().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_metadata_write_leaves_no_asset() {
        let fx = fixture().await;
        let source = fx.locator.uploads_dir(StorageTier::Storage1).join("photo-1-2.png");
        write_png(&source);
        let job = job(
            JobKind::Image,
            serde_json::to_value(payload(source, "photo-1-2.png", "photo.png", "image/png"))
                .unwrap(),
        );

        fx.assets.fail_next_metadata_writes(u32::MAX);
        for _ in 0..job.max_attempts {
            let err = fx
                .pipeline
                .process(&job, &damflow_core::progress::NoopProgress)
                .await
                .unwrap_err();
            assert!(err.is_retryable());
        }

        assert!(fx.assets.assets().is_empty());
        assert!(fx.assets.find_all_accessible(7, &[3]).await.unwrap().is_empty());
        assert!(fx.assets.find_by_id(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_fatal() {
        let fx = fixture().await;
        let job = job(JobKind::Image, serde_json::json!({"unexpected": true}));
        let err = fx
            .pipeline
            .process(&job, &damflow_core::progress::NoopProgress)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let fx = fixture().await;
        let source = fx.locator.uploads_dir(StorageTier::Storage1).join("gone.png");
        let job = job(
            JobKind::Image,
            serde_json::to_value(payload(source, "gone.png", "gone.png", "image/png")).unwrap(),
        );
        let err = fx
            .pipeline
            .process(&job, &damflow_core::progress::NoopProgress)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_corrupt_image_is_retryable() {
        let fx = fixture().await;
        let source = fx.locator.uploads_dir(StorageTier::Storage1).join("bad-1-2.png");
        std::fs::write(&source, b"not an image").unwrap();
        let job = job(
            JobKind::Image,
            serde_json::to_value(payload(source, "bad-1-2.png", "bad.png", "image/png")).unwrap(),
        );
        let err = fx
            .pipeline
            .process(&job, &damflow_core::progress::NoopProgress)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(fx.assets.assets().is_empty());
    }

    #[test]
    fn test_metadata_pairs_skip_empty_values() {
        let mut p = payload(PathBuf::from("/x"), "a-1-2.png", "a.png", "image/png");
        p.keywords = Some(" , ".to_string());
        p.fields.insert("blank".to_string(), "   ".to_string());
        let id = Uuid::new_v4();
        let pairs = metadata_pairs(id, &p);

        let names: Vec<&str> = pairs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["asset_code", "category", "title", "created_date", "photographer"]
        );
        assert_eq!(pairs[0].value, id.to_string());
    }
}
