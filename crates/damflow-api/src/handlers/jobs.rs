use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use damflow_core::models::JobStatus;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct JobNotFound {
    pub error: String,
}

/// Current state of a job. Safe to poll; unknown ids yield 404 rather than an error.
#[utoipa::path(
    get,
    path = "/assets/job/{job_id}",
    tag = "jobs",
    params(
        ("job_id" = String, Path, description = "Job id returned by the upload")
    ),
    responses(
        (status = 200, description = "Job status", body = JobStatus),
        (status = 404, description = "Unknown job", body = JobNotFound),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, HttpAppError> {
    let status = match Uuid::parse_str(job_id.trim()) {
        Ok(id) => state.queue.status(id).await?,
        Err(_) => None,
    };

    match status {
        Some(status) => Ok(Json(status).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(JobNotFound {
                error: "not found".to_string(),
            }),
        )
            .into_response()),
    }
}
