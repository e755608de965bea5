//! Job queue: worker pool, LISTEN/NOTIFY or polling wake-ups, retry, and submission.
//!
//! Shutdown: [`JobQueue::shutdown`] stops the claim loop; it does not wait for in-flight
//! jobs. An active job interrupted by process exit is picked up again by the stale job
//! reaper once its grace period has passed.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use damflow_core::models::{Backoff, Job, JobKind, JobStatus, NewJob, RetryPolicy};
use damflow_core::{JobError, JobQueueSettings};
use damflow_db::{JobStore, NEW_JOB_CHANNEL};

use crate::context::JobHandlerContext;
use crate::progress::JobProgress;

/// Upper bound on the delay before a retry.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(3600);

/// Delay before the attempt after `attempt` (1-based) failed.
pub fn compute_retry_backoff(backoff: &Backoff, attempt: i32) -> Duration {
    let ms = match *backoff {
        Backoff::Fixed { delay_ms } => delay_ms,
        Backoff::Exponential { delay_ms } => {
            let exponent = attempt.saturating_sub(1).clamp(0, 32) as u32;
            delay_ms.saturating_mul(2_u64.saturating_pow(exponent))
        }
    };
    Duration::from_millis(ms).min(MAX_RETRY_BACKOFF)
}

#[derive(Clone, Debug)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    /// Kinds this pool claims.
    pub kinds: Vec<JobKind>,
    /// Policy used by [`JobQueue::enqueue_default`].
    pub default_policy: RetryPolicy,
    /// Interval in seconds between runs of the stale job reaper. 0 disables it.
    pub stale_reap_interval_secs: u64,
    /// Active jobs started longer ago than this are assumed orphaned.
    pub stale_grace_period_secs: i64,
    /// Finished jobs older than this many days are purged by the reaper. 0 keeps them.
    pub retention_days: i32,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            kinds: JobKind::ALL.to_vec(),
            default_policy: RetryPolicy::default(),
            stale_reap_interval_secs: 60,
            stale_grace_period_secs: 3600,
            retention_days: 0,
        }
    }
}

impl JobQueueConfig {
    pub fn from_settings(settings: &JobQueueSettings) -> Self {
        Self {
            max_workers: settings.max_workers.max(1),
            poll_interval_ms: settings.poll_interval_ms,
            kinds: JobKind::ALL.to_vec(),
            default_policy: RetryPolicy {
                attempts: settings.max_attempts,
                backoff: Backoff::Exponential {
                    delay_ms: settings.backoff_delay_ms,
                },
                ..RetryPolicy::default()
            },
            stale_reap_interval_secs: settings.stale_reap_interval_secs,
            stale_grace_period_secs: settings.stale_grace_period_secs,
            retention_days: settings.retention_days,
        }
    }
}

#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    config: JobQueueConfig,
    wake: Arc<Notify>,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobQueue {
    /// Create a new JobQueue and spawn its worker pool.
    ///
    /// If `pool` is `Some`, the worker also LISTENs on [`NEW_JOB_CHANNEL`] so jobs enqueued
    /// by other processes are picked up immediately. Polling at `poll_interval_ms` always
    /// runs as a fallback.
    pub fn new(
        store: Arc<dyn JobStore>,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let wake = Arc::new(Notify::new());

        tokio::spawn(Self::worker_pool(
            store.clone(),
            config.clone(),
            context,
            wake.clone(),
            shutdown_rx,
            pool,
        ));

        Self {
            store,
            config,
            wake,
            shutdown_tx,
        }
    }

    /// Creates a JobQueue that only submits. Jobs are written to the store and run by
    /// whichever process owns a worker pool.
    pub fn new_no_worker(store: Arc<dyn JobStore>, config: JobQueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self {
            store,
            config,
            wake: Arc::new(Notify::new()),
            shutdown_tx,
        }
    }

    /// Persists a waiting job and wakes the pool. Never waits for processing.
    #[tracing::instrument(skip(self, payload, policy), fields(job.kind = %kind))]
    pub async fn enqueue(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        policy: RetryPolicy,
    ) -> Result<Uuid> {
        let job = self
            .store
            .create_job(NewJob {
                kind,
                payload,
                policy,
            })
            .await
            .map_err(|e| {
                tracing::error!(error = %e, job.kind = %kind, "Failed to create job in store");
                e
            })
            .context("Failed to enqueue job")?;

        self.wake.notify_one();
        tracing::info!(
            job.id = %job.id,
            job.kind = %kind,
            max_attempts = job.max_attempts,
            "Job enqueued"
        );
        Ok(job.id)
    }

    /// [`JobQueue::enqueue`] with the configured default policy.
    pub async fn enqueue_default(&self, kind: JobKind, payload: serde_json::Value) -> Result<Uuid> {
        self.enqueue(kind, payload, self.config.default_policy).await
    }

    /// Current view of the job, or `None` for unknown and purged ids.
    pub async fn status(&self, id: Uuid) -> Result<Option<JobStatus>> {
        let job = self
            .store
            .get_job(id)
            .await
            .context("Failed to load job status")?;
        Ok(job.map(|j| j.status()))
    }

    async fn worker_pool(
        store: Arc<dyn JobStore>,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        wake: Arc<Notify>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = pool.is_some(),
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));
        let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));

        let listener = pool.map(|pool| tokio::spawn(Self::listen(pool, wake.clone())));

        let (reaper_shutdown_tx, reaper_shutdown_rx) = mpsc::channel::<()>(1);
        if config.stale_reap_interval_secs > 0 {
            tokio::spawn(Self::reaper(
                store.clone(),
                config.clone(),
                reaper_shutdown_rx,
            ));
        }

        // The context may not be upgradable yet while the owning state is being built.
        let mut context_seen = false;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                _ = wake.notified() => {}
                _ = sleep(poll_interval) => {}
            }

            if !Self::claim_available(
                &store,
                &config.kinds,
                &semaphore,
                &context,
                &mut context_seen,
            )
            .await
            {
                tracing::info!("Job handler context dropped, stopping worker pool");
                break;
            }
        }

        let _ = reaper_shutdown_tx.send(()).await;
        if let Some(listener) = listener {
            listener.abort();
        }
        tracing::info!("Job queue worker pool stopped");
    }

    async fn listen(pool: sqlx::PgPool, wake: Arc<Notify>) {
        loop {
            match sqlx::postgres::PgListener::connect_with(&pool).await {
                Ok(mut listener) => {
                    if let Err(e) = listener.listen(NEW_JOB_CHANNEL).await {
                        tracing::warn!(error = %e, "LISTEN failed, will retry");
                        sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                    while listener.recv().await.is_ok() {
                        wake.notify_one();
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "PgListener connect failed, will retry");
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn reaper(
        store: Arc<dyn JobStore>,
        config: JobQueueConfig,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.stale_reap_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => sweep(store.as_ref(), &config).await,
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    /// Claims jobs while a slot is free and work is available. Returns false once the
    /// handler context is gone.
    async fn claim_available(
        store: &Arc<dyn JobStore>,
        kinds: &[JobKind],
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn JobHandlerContext>,
        context_seen: &mut bool,
    ) -> bool {
        loop {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::trace!("No workers available, skipping claim");
                    return true;
                }
            };

            let Some(ctx) = context.upgrade() else {
                return !*context_seen;
            };
            *context_seen = true;

            match store.claim_next(kinds).await {
                Ok(Some(job)) => {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = Self::process_job(job, store, ctx).await {
                            tracing::error!(error = %e, "Failed to record job outcome");
                        }
                    });
                }
                Ok(None) => {
                    tracing::trace!("No jobs available in queue");
                    return true;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim job from queue");
                    return true;
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(job.id = %job.id, job.kind = %job.kind, attempt = job.attempts))]
    async fn process_job(
        job: Job,
        store: Arc<dyn JobStore>,
        context: Arc<dyn JobHandlerContext>,
    ) -> Result<()> {
        let progress = JobProgress::new(store.clone(), job.id, job.attempts);

        match context.clone().dispatch_job(&job, progress).await {
            Ok(result) => {
                let Some(done) = store
                    .mark_completed(job.id, job.attempts, result)
                    .await
                    .context("Failed to mark job as completed")?
                else {
                    tracing::warn!("Job was reclaimed before completion was recorded");
                    return Ok(());
                };
                tracing::info!("Job completed successfully");
                if done.remove_on_complete {
                    store.delete_job(done.id).await?;
                }
                Ok(())
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                let fatal = JobError::is_fatal(&e);

                tracing::error!(
                    error = %reason,
                    max_attempts = job.max_attempts,
                    unrecoverable = fatal,
                    "Job execution failed"
                );

                if !fatal && job.can_retry() {
                    let delay = compute_retry_backoff(&job.backoff, job.attempts);
                    let run_at = Utc::now()
                        + chrono::Duration::milliseconds(delay.as_millis() as i64);
                    tracing::info!(
                        next_attempt = job.attempts + 1,
                        backoff_ms = delay.as_millis() as u64,
                        "Scheduling job retry"
                    );
                    store
                        .schedule_retry(job.id, job.attempts, &reason, run_at)
                        .await
                        .context("Failed to schedule job retry")?;
                    return Ok(());
                }

                let Some(failed) = store
                    .mark_failed(job.id, job.attempts, &reason)
                    .await
                    .context("Failed to mark job as failed")?
                else {
                    tracing::warn!("Job was reclaimed before failure was recorded");
                    return Ok(());
                };
                tracing::error!(attempts = failed.attempts, "Job failed, no attempts left");
                context.job_failed(&failed).await;
                if failed.remove_on_fail {
                    store.delete_job(failed.id).await?;
                }
                Ok(())
            }
        }
    }

    /// Stops the worker pool from claiming new jobs.
    ///
    /// Returns as soon as the signal is sent; already-running handlers continue until they
    /// finish.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// One reaper pass: requeue orphaned active jobs and purge expired finished ones.
async fn sweep(store: &dyn JobStore, config: &JobQueueConfig) {
    let now = Utc::now();

    let started_before = now - chrono::Duration::seconds(config.stale_grace_period_secs);
    match store.requeue_stale(started_before).await {
        Ok(0) => {}
        Ok(count) => tracing::warn!(count, "Requeued stale active jobs"),
        Err(e) => tracing::error!(error = %e, "Stale job reaper failed"),
    }

    if config.retention_days > 0 {
        let finished_before = now - chrono::Duration::days(i64::from(config.retention_days));
        match store.purge_finished(finished_before).await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Purged finished jobs past retention"),
            Err(e) => tracing::error!(error = %e, "Job retention sweep failed"),
        }
    }
}
