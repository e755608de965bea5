//! Job handler context trait
//!
//! The API implements this trait for its application state. The worker calls
//! `dispatch_job` for every claimed job; the implementation matches on the job kind and
//! invokes the appropriate handler, and `job_failed` once a job has failed for good.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use damflow_core::models::Job;

use crate::progress::JobProgress;

/// Context for job dispatch.
///
/// Returning an error wrapped in a fatal [`damflow_core::JobError`] fails the job without
/// further attempts. Any other error is retried while attempts remain.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    /// Runs the job and returns the value stored as its result.
    async fn dispatch_job(
        self: Arc<Self>,
        job: &Job,
        progress: JobProgress,
    ) -> Result<serde_json::Value>;

    /// Called once after `job` is recorded as failed with no attempts left.
    async fn job_failed(self: Arc<Self>, _job: &Job) {}
}
