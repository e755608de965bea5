use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use damflow_core::models::{Asset, AssetSearch, AssetSearchPage, JobKind, SoftDeletePayload};
use damflow_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::UserContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::{load_accessible_asset, visible_groups};
use crate::state::AppState;

/// Lists the active assets the caller owns or can see through a group.
#[utoipa::path(
    get,
    path = "/assets",
    tag = "assets",
    params(
        ("x-user-id" = i64, Header, description = "Authenticated user id"),
        ("x-group-ids" = Option<String>, Header, description = "Comma separated group ids narrowing the listing")
    ),
    responses(
        (status = 200, description = "Accessible assets, newest first", body = Vec<Asset>),
        (status = 401, description = "Missing identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user.id = user.user_id))]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    user: UserContext,
) -> Result<Json<Vec<Asset>>, HttpAppError> {
    let groups = visible_groups(&state, &user).await?;
    let assets = state
        .assets
        .find_all_accessible(user.user_id, &groups)
        .await?;
    tracing::debug!(count = assets.len(), "Listed assets");
    Ok(Json(assets))
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Substring of the display name
    pub name: Option<String>,
    /// image, video, audio, document or all
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    /// RFC 3339 timestamp or YYYY-MM-DD, compared with the last update
    #[serde(alias = "fromDate")]
    pub from_date: Option<String>,
    /// RFC 3339 timestamp or YYYY-MM-DD (whole day included)
    #[serde(alias = "toDate")]
    pub to_date: Option<String>,
    /// Comma separated; an asset matches if any keyword matches
    pub keywords: Option<String>,
    /// name, created_at, updated_at (default) or size
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    /// ASC or DESC (default)
    pub order: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SearchQuery {
    fn into_search(self) -> Result<AssetSearch, AppError> {
        let invalid = |e: anyhow::Error| AppError::InvalidInput(e.to_string());
        let defaults = AssetSearch::default();

        let page = self.page.unwrap_or(defaults.page);
        if page == 0 {
            return Err(AppError::InvalidInput("page must be at least 1".to_string()));
        }
        let limit = self.limit.unwrap_or(defaults.limit);
        if limit == 0 || limit > AssetSearch::MAX_LIMIT {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                AssetSearch::MAX_LIMIT
            )));
        }

        let search = AssetSearch {
            name: self.name,
            file_type: match self.file_type.as_deref() {
                Some(raw) => raw.parse().map_err(invalid)?,
                None => defaults.file_type,
            },
            from_date: self
                .from_date
                .as_deref()
                .map(|raw| parse_date_bound(raw, false))
                .transpose()?,
            to_date: self
                .to_date
                .as_deref()
                .map(|raw| parse_date_bound(raw, true))
                .transpose()?,
            keywords: self
                .keywords
                .as_deref()
                .map(AssetSearch::parse_keywords)
                .unwrap_or_default(),
            sort_by: match self.sort_by.as_deref() {
                Some(raw) => raw.parse().map_err(invalid)?,
                None => defaults.sort_by,
            },
            order: match self.order.as_deref() {
                Some(raw) => raw.parse().map_err(invalid)?,
                None => defaults.order,
            },
            page,
            limit,
        };

        if let (Some(from), Some(to)) = (search.from_date, search.to_date) {
            if from > to {
                return Err(AppError::InvalidInput(
                    "from_date must not be after to_date".to_string(),
                ));
            }
        }
        Ok(search)
    }
}

/// A bare date means the start of that day, or its last instant for an upper bound.
fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("Invalid date: {}", raw)))?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| AppError::Internal("Invalid time of day".to_string()))?;
    Ok(date.and_time(time).and_utc())
}

/// Searches the assets the caller can see by name, type, update date and keywords.
#[utoipa::path(
    get,
    path = "/assets/search",
    tag = "assets",
    params(
        SearchQuery,
        ("x-user-id" = i64, Header, description = "Authenticated user id"),
        ("x-group-ids" = Option<String>, Header, description = "Comma separated group ids narrowing the search")
    ),
    responses(
        (status = 200, description = "One page of matching assets", body = AssetSearchPage),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, query), fields(user.id = user.user_id))]
pub async fn search_assets(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Query(query): Query<SearchQuery>,
) -> Result<Json<AssetSearchPage>, HttpAppError> {
    let search = query.into_search()?;
    let groups = visible_groups(&state, &user).await?;
    let page = state.assets.search(user.user_id, &groups, &search).await?;
    tracing::debug!(
        total = page.pagination.total,
        returned = page.data.len(),
        "Searched assets"
    );
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/assets/{id}",
    tag = "assets",
    params(
        ("id" = String, Path, description = "Asset id"),
        ("x-user-id" = i64, Header, description = "Authenticated user id")
    ),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user), fields(user.id = user.user_id))]
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    Path(id): Path<String>,
) -> Result<Json<Asset>, HttpAppError> {
    let asset = load_accessible_asset(&state, &user, &id).await?;
    Ok(Json(asset))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteAssetsRequest {
    #[serde(alias = "assetIds")]
    pub asset_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteAssetsResponse {
    /// Soft-delete job to poll
    pub job_id: Uuid,
}

/// Queues a soft delete of the given assets. Every existing asset in the list must be
/// accessible to the caller; ids that do not exist are reported by the job.
#[utoipa::path(
    post,
    path = "/assets/delete",
    tag = "assets",
    params(
        ("x-user-id" = i64, Header, description = "Authenticated user id")
    ),
    request_body = DeleteAssetsRequest,
    responses(
        (status = 202, description = "Soft delete queued", body = DeleteAssetsResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Access denied", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, user, request), fields(user.id = user.user_id))]
pub async fn delete_assets(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    ValidatedJson(request): ValidatedJson<DeleteAssetsRequest>,
) -> Result<(StatusCode, Json<DeleteAssetsResponse>), HttpAppError> {
    let mut asset_ids = request.asset_ids;
    asset_ids.sort();
    asset_ids.dedup();

    if asset_ids.is_empty() {
        return Err(AppError::InvalidInput("asset_ids must not be empty".to_string()).into());
    }

    for id in &asset_ids {
        if let Some(asset) = state.assets.find_by_id(*id).await? {
            if !state.access.can_access(&asset, user.user_id).await? {
                return Err(AppError::Forbidden(format!(
                    "You do not have access to asset {}",
                    id
                ))
                .into());
            }
        }
    }

    let count = asset_ids.len();
    let payload = serde_json::to_value(SoftDeletePayload { asset_ids })
        .map_err(|e| AppError::Internal(format!("Failed to encode job payload: {}", e)))?;
    let job_id = state
        .queue
        .enqueue_default(JobKind::SoftDelete, payload)
        .await?;

    tracing::info!(job.id = %job_id, count, "Soft delete queued");
    Ok((StatusCode::ACCEPTED, Json(DeleteAssetsResponse { job_id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use damflow_core::models::{AssetSortField, AssetTypeFilter, SortOrder};

    #[test]
    fn test_search_query_defaults() {
        let search = SearchQuery::default().into_search().unwrap();
        assert_eq!(search, AssetSearch::default());
    }

    #[test]
    fn test_search_query_parses_filters() {
        let query = SearchQuery {
            file_type: Some("video".to_string()),
            from_date: Some("2024-03-01".to_string()),
            to_date: Some("2024-03-01".to_string()),
            keywords: Some("sea, ,sun".to_string()),
            sort_by: Some("createdAt".to_string()),
            order: Some("asc".to_string()),
            page: Some(2),
            limit: Some(5),
            ..SearchQuery::default()
        };
        let search = query.into_search().unwrap();
        assert_eq!(search.file_type, AssetTypeFilter::Video);
        assert_eq!(search.sort_by, AssetSortField::CreatedAt);
        assert_eq!(search.order, SortOrder::Asc);
        assert_eq!(search.keywords, vec!["sea".to_string(), "sun".to_string()]);
        let from = search.from_date.unwrap();
        let to = search.to_date.unwrap();
        assert_eq!(from.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(to > from && to.date_naive() == from.date_naive());
    }

    #[test]
    fn test_search_query_rejects_bad_input() {
        for query in [
            SearchQuery { page: Some(0), ..SearchQuery::default() },
            SearchQuery { limit: Some(101), ..SearchQuery::default() },
            SearchQuery { file_type: Some("spreadsheet".to_string()), ..SearchQuery::default() },
            SearchQuery { from_date: Some("yesterday".to_string()), ..SearchQuery::default() },
            SearchQuery {
                from_date: Some("2024-03-02".to_string()),
                to_date: Some("2024-03-01".to_string()),
                ..SearchQuery::default()
            },
        ] {
            assert!(matches!(query.into_search(), Err(AppError::InvalidInput(_))));
        }
    }
}
