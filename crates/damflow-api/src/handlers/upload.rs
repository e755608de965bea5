use axum::{
    extract::{Multipart, State},
    Json,
};
use damflow_core::models::UploadReceipt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::UploadService;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// One receipt per accepted file, in request order
    pub files: Vec<UploadReceipt>,
}

/// Accepts one or more files and enqueues a processing job for each.
///
/// Multipart parts: `file` (repeatable), `checksum` (SHA-256 hex, matched to files by
/// order), `group_id`, `storage` (must precede the files), `keywords`, `description`.
/// Any other text part is kept as free-form metadata.
#[utoipa::path(
    post,
    path = "/assets/upload",
    tag = "assets",
    params(
        ("x-user-id" = i64, Header, description = "Authenticated user id"),
        ("x-group-ids" = Option<String>, Header, description = "Comma separated group ids")
    ),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Files accepted and queued", body = UploadResponse),
        (status = 400, description = "Invalid input or checksum mismatch", body = ErrorResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
        (status = 403, description = "Not allowed to upload to the group", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse)
    )
)]
pub async fn upload_assets(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let files = UploadService::new(&state).upload(&user, multipart).await?;
    Ok(Json(UploadResponse { files }))
}
