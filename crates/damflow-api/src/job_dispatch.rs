//! JobHandlerContext implementation for AppState.
//!
//! Routes each claimed job to its handler by kind, and queues a cleanup of the preview
//! left behind by a media job that failed for good.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use damflow_core::models::{AssetJobPayload, CleanupPayload, Job, JobKind, SoftDeletePayload};
use damflow_core::JobResultExt;
use damflow_processing::{run_cleanup, run_soft_delete, PreviewGenerator};
use damflow_worker::{JobHandlerContext, JobProgress};

use crate::state::AppState;

impl AppState {
    /// Preview files written for a failed media job that no asset refers to.
    async fn orphaned_previews(&self, job: &Job) -> Result<Vec<PathBuf>> {
        let payload = job
            .payload_as::<AssetJobPayload>()
            .context("Malformed asset job payload")?;

        // The asset id is the job id. An earlier attempt may have stored it.
        if self.assets.find_by_id(job.id).await?.is_some() {
            return Ok(Vec::new());
        }

        let dir = self.locator.thumbnails_dir(payload.storage_tier);
        let mut files = Vec::new();
        for name in PreviewGenerator::output_names(&payload.file.stored_name) {
            let path = dir.join(name);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl JobHandlerContext for AppState {
    async fn dispatch_job(
        self: Arc<Self>,
        job: &Job,
        progress: JobProgress,
    ) -> Result<serde_json::Value> {
        match job.kind {
            JobKind::Image | JobKind::Video | JobKind::Document => {
                let result = self.pipeline.process(job, &progress).await?;
                Ok(serde_json::to_value(result)?)
            }
            JobKind::Cleanup => {
                let payload = job
                    .payload_as::<CleanupPayload>()
                    .context("Malformed cleanup payload")
                    .fatal()?;
                let result = run_cleanup(&self.locator, &payload).await;
                Ok(serde_json::to_value(result)?)
            }
            JobKind::SoftDelete => {
                let payload = job
                    .payload_as::<SoftDeletePayload>()
                    .context("Malformed soft-delete payload")
                    .fatal()?;
                let result = run_soft_delete(self.assets.as_ref(), &payload).await?;
                Ok(serde_json::to_value(result)?)
            }
        }
    }

    async fn job_failed(self: Arc<Self>, job: &Job) {
        if !matches!(job.kind, JobKind::Image | JobKind::Video | JobKind::Document) {
            return;
        }

        let files = match self.orphaned_previews(job).await {
            Ok(files) if files.is_empty() => return,
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(job.id = %job.id, error = %e, "Could not look up orphaned previews");
                return;
            }
        };

        let count = files.len();
        let enqueued = match serde_json::to_value(CleanupPayload { files }) {
            Ok(payload) => self.queue.enqueue_default(JobKind::Cleanup, payload).await,
            Err(e) => Err(e.into()),
        };
        match enqueued {
            Ok(cleanup_id) => tracing::info!(
                job.id = %job.id,
                cleanup.id = %cleanup_id,
                files = count,
                "Queued cleanup of orphaned previews"
            ),
            Err(e) => tracing::error!(
                job.id = %job.id,
                error = %e,
                "Failed to queue cleanup of orphaned previews"
            ),
        }
    }
}
