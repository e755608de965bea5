use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use damflow_core::ProgressReporter;
use damflow_db::JobStore;

/// Progress handle for one attempt of one job.
///
/// Only the worker that claimed the attempt gets a handle. Values above 100 are clamped
/// and values not above the last reported one are dropped without touching the store.
#[derive(Clone)]
pub struct JobProgress {
    store: Arc<dyn JobStore>,
    job_id: Uuid,
    attempt: i32,
    last: Arc<AtomicU8>,
}

impl JobProgress {
    pub fn new(store: Arc<dyn JobStore>, job_id: Uuid, attempt: i32) -> Self {
        Self {
            store,
            job_id,
            attempt,
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn attempt(&self) -> i32 {
        self.attempt
    }

    /// Last value accepted by this handle.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }

    /// Returns true when the value was written.
    pub async fn set(&self, percent: u8) -> bool {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::AcqRel);
        if percent <= previous {
            return false;
        }

        match self
            .store
            .update_progress(self.job_id, self.attempt, i32::from(percent))
            .await
        {
            Ok(true) => {
                tracing::trace!(job.id = %self.job_id, progress = percent, "Job progress");
                true
            }
            Ok(false) => {
                tracing::debug!(
                    job.id = %self.job_id,
                    attempt = self.attempt,
                    "Progress update ignored, attempt no longer owns the job"
                );
                false
            }
            Err(e) => {
                tracing::warn!(job.id = %self.job_id, error = %e, "Failed to record job progress");
                false
            }
        }
    }
}

#[async_trait]
impl ProgressReporter for JobProgress {
    async fn report(&self, percent: u8) {
        self.set(percent).await;
    }
}
