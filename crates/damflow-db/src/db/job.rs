use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use damflow_core::models::{Job, JobKind, NewJob};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::store::JobStore;

/// Postgres channel notified whenever a job is inserted.
pub const NEW_JOB_CHANNEL: &str = "damflow_new_job";

const JOB_COLUMNS: &str = r#"
    id, kind, payload, state, progress, attempts, max_attempts,
    backoff_kind, backoff_delay_ms, result, failed_reason,
    remove_on_complete, remove_on_fail, run_at, started_at, finished_at,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    /// Inserts a waiting job and notifies listening workers in the same transaction.
    #[tracing::instrument(skip(self, job), fields(job.kind = %job.kind))]
    async fn create_job(&self, job: NewJob) -> Result<Job> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for job creation")?;

        let sql = format!(
            r#"
            INSERT INTO jobs (
                id, kind, payload, state, max_attempts, backoff_kind, backoff_delay_ms,
                remove_on_complete, remove_on_fail, run_at
            )
            VALUES ($1, $2, $3, 'waiting', $4, $5, $6, $7, $8, NOW())
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let created: Job = sqlx::query_as::<Postgres, Job>(&sql)
            .bind(Uuid::new_v4())
            .bind(job.kind.as_str())
            .bind(&job.payload)
            .bind(job.policy.attempts.max(1) as i32)
            .bind(job.policy.backoff.kind())
            .bind(job.policy.backoff.delay_ms() as i64)
            .bind(job.policy.remove_on_complete)
            .bind(job.policy.remove_on_fail)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert job")?;

        // Workers also poll, so a failed notify only delays pickup.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(NEW_JOB_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                job.id = %created.id,
                "Failed to send pg_notify for new job, workers will discover it via polling"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit transaction for job creation")?;

        tracing::info!(
            job.id = %created.id,
            job.kind = %created.kind,
            max_attempts = created.max_attempts,
            "Job enqueued"
        );
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);
        let job = sqlx::query_as::<Postgres, Job>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch job")?;
        Ok(job)
    }

    #[tracing::instrument(skip(self))]
    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>> {
        let kinds: Vec<&str> = kinds.iter().map(JobKind::as_str).collect();

        // Single statement: the inner select locks one candidate row and skips rows
        // other workers already hold.
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'active',
                attempts = attempts + 1,
                progress = 0,
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = (
                SELECT id
                FROM jobs
                WHERE state = 'waiting'
                    AND run_at <= NOW()
                    AND kind = ANY($1)
                ORDER BY run_at ASC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        let job = sqlx::query_as::<Postgres, Job>(&sql)
            .bind(&kinds)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to claim next job")?;

        if let Some(job) = &job {
            tracing::debug!(
                job.id = %job.id,
                job.kind = %job.kind,
                attempt = job.attempts,
                "Job claimed"
            );
        }
        Ok(job)
    }

    #[tracing::instrument(skip(self))]
    async fn update_progress(&self, id: Uuid, attempt: i32, progress: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET progress = GREATEST(progress, $3), updated_at = NOW()
            WHERE id = $1 AND attempts = $2 AND state = 'active'
            "#,
        )
        .bind(id)
        .bind(attempt)
        .bind(progress.clamp(0, 100))
        .execute(&self.pool)
        .await
        .context("Failed to update job progress")?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, result))]
    async fn mark_completed(
        &self,
        id: Uuid,
        attempt: i32,
        result: serde_json::Value,
    ) -> Result<Option<Job>> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'completed',
                progress = 100,
                result = $3,
                failed_reason = NULL,
                finished_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND attempts = $2 AND state = 'active'
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let job = sqlx::query_as::<Postgres, Job>(&sql)
            .bind(id)
            .bind(attempt)
            .bind(result)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to mark job as completed")?;
        Ok(job)
    }

    #[tracing::instrument(skip(self, reason))]
    async fn mark_failed(&self, id: Uuid, attempt: i32, reason: &str) -> Result<Option<Job>> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'failed',
                failed_reason = $3,
                finished_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND attempts = $2 AND state = 'active'
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let job = sqlx::query_as::<Postgres, Job>(&sql)
            .bind(id)
            .bind(attempt)
            .bind(reason)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to mark job as failed")?;
        Ok(job)
    }

    #[tracing::instrument(skip(self, reason))]
    async fn schedule_retry(
        &self,
        id: Uuid,
        attempt: i32,
        reason: &str,
        run_at: DateTime<Utc>,
    ) -> Result<Option<Job>> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'waiting',
                failed_reason = $3,
                run_at = $4,
                started_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND attempts = $2 AND state = 'active'
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let job = sqlx::query_as::<Postgres, Job>(&sql)
            .bind(id)
            .bind(attempt)
            .bind(reason)
            .bind(run_at)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to schedule job retry")?;
        Ok(job)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete job")?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn requeue_stale(&self, started_before: DateTime<Utc>) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for stale job recovery")?;

        let exhausted = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed',
                failed_reason = 'worker stopped responding',
                finished_at = NOW(),
                updated_at = NOW()
            WHERE state = 'active'
                AND started_at < $1
                AND attempts >= max_attempts
            "#,
        )
        .bind(started_before)
        .execute(&mut *tx)
        .await
        .context("Failed to fail exhausted stale jobs")?
        .rows_affected();

        let requeued = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'waiting',
                run_at = NOW(),
                started_at = NULL,
                updated_at = NOW()
            WHERE state = 'active'
                AND started_at < $1
                AND attempts < max_attempts
            "#,
        )
        .bind(started_before)
        .execute(&mut *tx)
        .await
        .context("Failed to requeue stale jobs")?
        .rows_affected();

        tx.commit()
            .await
            .context("Failed to commit stale job recovery")?;

        if exhausted + requeued > 0 {
            tracing::warn!(requeued, exhausted, "Recovered stale active jobs");
        }
        Ok(exhausted + requeued)
    }

    #[tracing::instrument(skip(self))]
    async fn purge_finished(&self, finished_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE state IN ('completed', 'failed')
                AND finished_at < $1
            "#,
        )
        .bind(finished_before)
        .execute(&self.pool)
        .await
        .context("Failed to purge finished jobs")?;
        Ok(result.rows_affected())
    }
}
