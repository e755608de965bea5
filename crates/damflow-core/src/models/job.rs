use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::{DEFAULT_JOB_ATTEMPTS, DEFAULT_JOB_BACKOFF_MS};
use crate::models::asset::MediaClass;

/// Closed set of work the queue knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
    Document,
    Cleanup,
    SoftDelete,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Image,
        JobKind::Video,
        JobKind::Document,
        JobKind::Cleanup,
        JobKind::SoftDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Image => "image",
            JobKind::Video => "video",
            JobKind::Document => "document",
            JobKind::Cleanup => "cleanup",
            JobKind::SoftDelete => "soft_delete",
        }
    }
}

impl From<MediaClass> for JobKind {
    fn from(class: MediaClass) -> Self {
        match class {
            MediaClass::Image => JobKind::Image,
            MediaClass::Video => JobKind::Video,
            MediaClass::Document => JobKind::Document,
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(JobKind::Image),
            "video" => Ok(JobKind::Video),
            "document" => Ok(JobKind::Document),
            "cleanup" => Ok(JobKind::Cleanup),
            "soft_delete" => Ok(JobKind::SoftDelete),
            _ => Err(anyhow::anyhow!("Invalid job kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobState::Waiting => write!(f, "waiting"),
            JobState::Active => write!(f, "active"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            _ => Err(anyhow::anyhow!("Invalid job state: {}", s)),
        }
    }
}

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    /// `delay_ms * 2^(attempt - 1)`
    Exponential { delay_ms: u64 },
}

impl Backoff {
    pub fn kind(&self) -> &'static str {
        match self {
            Backoff::Fixed { .. } => "fixed",
            Backoff::Exponential { .. } => "exponential",
        }
    }

    pub fn delay_ms(&self) -> u64 {
        match self {
            Backoff::Fixed { delay_ms } | Backoff::Exponential { delay_ms } => *delay_ms,
        }
    }

    pub fn from_parts(kind: &str, delay_ms: u64) -> Result<Self, anyhow::Error> {
        match kind {
            "fixed" => Ok(Backoff::Fixed { delay_ms }),
            "exponential" => Ok(Backoff::Exponential { delay_ms }),
            _ => Err(anyhow::anyhow!("Invalid backoff kind: {}", kind)),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            delay_ms: DEFAULT_JOB_BACKOFF_MS,
        }
    }
}

/// Retry and retention settings attached to a job at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Backoff,
    pub remove_on_complete: bool,
    pub remove_on_fail: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_JOB_ATTEMPTS,
            backoff: Backoff::default(),
            remove_on_complete: false,
            remove_on_fail: false,
        }
    }
}

/// A unit of queued work.
///
/// `attempts` counts claims, so while a job is active it is the number of the attempt
/// in progress (starting at 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub progress: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff: Backoff,
    pub result: Option<serde_json::Value>,
    pub failed_reason: Option<String>,
    pub remove_on_complete: bool,
    pub remove_on_fail: bool,
    pub run_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Job {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let backoff_kind: String = row.try_get("backoff_kind")?;
        let backoff_delay_ms: i64 = row.try_get("backoff_delay_ms")?;
        Ok(Job {
            id: row.try_get("id")?,
            kind: row.try_get::<String, _>("kind")?.parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse job kind: {}", e).into())
            })?,
            payload: row.try_get("payload")?,
            state: row.try_get::<String, _>("state")?.parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse job state: {}", e).into())
            })?,
            progress: row.try_get("progress")?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
            backoff: Backoff::from_parts(&backoff_kind, backoff_delay_ms.max(0) as u64).map_err(
                |e| sqlx::Error::Decode(format!("Failed to parse backoff: {}", e).into()),
            )?,
            result: row.try_get("result")?,
            failed_reason: row.try_get("failed_reason")?,
            remove_on_complete: row.try_get("remove_on_complete")?,
            remove_on_fail: row.try_get("remove_on_fail")?,
            run_at: row.try_get("run_at")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Job {
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Deserializes the payload into a typed struct.
    pub fn payload_as<P: for<'de> Deserialize<'de>>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            id: self.id,
            kind: self.kind,
            state: self.state,
            progress: self.progress,
            result: self.result.clone(),
            failed_reason: self.failed_reason.clone(),
            attempts: self.attempts,
            timestamp: self.created_at.timestamp_millis(),
        }
    }
}

/// Parameters for inserting a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub policy: RetryPolicy,
}

/// Pollable view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobStatus {
    pub id: Uuid,
    pub kind: JobKind,
    pub state: JobState,
    /// Percentage, 0 to 100
    pub progress: i32,
    /// Set once the job completed
    pub result: Option<serde_json::Value>,
    /// Last error, kept while retrying and after failure
    pub failed_reason: Option<String>,
    pub attempts: i32,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
}
