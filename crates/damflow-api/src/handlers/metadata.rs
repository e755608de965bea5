use axum::{
    extract::{Path, State},
    Json,
};
use damflow_core::models::{AssetMetadataEntry, MetadataField, MetadataValue};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::load_accessible_asset;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveMetadataRequest {
    pub metadata: Vec<MetadataValue>,
}

#[utoipa::path(
    get,
    path = "/assets/metadata-fields",
    tag = "metadata",
    responses(
        (status = 200, description = "All metadata field definitions", body = Vec<MetadataField>)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_metadata_fields(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MetadataField>>, HttpAppError> {
    Ok(Json(state.assets.list_metadata_fields().await?))
}

#[utoipa::path(
    get,
    path = "/assets/{id}/metadata",
    tag = "metadata",
    params(
        ("id" = String, Path, description = "Asset id"),
        ("x-user-id" = i64, Header, description = "Authenticated user id")
    ),
    responses(
        (status = 200, description = "Metadata values of the asset", body = Vec<AssetMetadataEntry>),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user.id = user.user_id))]
pub async fn get_asset_metadata(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<String>,
) -> Result<Json<Vec<AssetMetadataEntry>>, HttpAppError> {
    let asset = load_accessible_asset(&state, &user, &id).await?;
    Ok(Json(state.assets.list_metadata(asset.id).await?))
}

/// Inserts or replaces values for existing fields. Empty values are ignored; saving a
/// `title` also renames the asset.
#[utoipa::path(
    post,
    path = "/assets/{id}/metadata",
    tag = "metadata",
    params(
        ("id" = String, Path, description = "Asset id"),
        ("x-user-id" = i64, Header, description = "Authenticated user id")
    ),
    request_body = SaveMetadataRequest,
    responses(
        (status = 200, description = "Metadata after the update", body = Vec<AssetMetadataEntry>),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Asset or field not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, request), fields(user.id = user.user_id, values = request.metadata.len()))]
pub async fn save_asset_metadata(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<SaveMetadataRequest>,
) -> Result<Json<Vec<AssetMetadataEntry>>, HttpAppError> {
    let asset = load_accessible_asset(&state, &user, &id).await?;
    state
        .assets
        .save_metadata_values(asset.id, &request.metadata)
        .await?;
    Ok(Json(state.assets.list_metadata(asset.id).await?))
}
