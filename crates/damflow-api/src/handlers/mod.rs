pub mod assets;
pub mod files;
pub mod health;
pub mod jobs;
pub mod metadata;
pub mod upload;

use damflow_core::models::Asset;
use damflow_core::AppError;
use uuid::Uuid;

use crate::auth::UserContext;
use crate::state::AppState;

/// Loads an active asset the caller may read. Unknown, malformed and deleted ids are
/// all reported as not found.
pub(crate) async fn load_accessible_asset(
    state: &AppState,
    user: &UserContext,
    raw_id: &str,
) -> Result<Asset, AppError> {
    let not_found = || AppError::NotFound("Asset not found".to_string());

    let id = Uuid::parse_str(raw_id.trim()).map_err(|_| not_found())?;
    let asset = state
        .assets
        .find_by_id(id)
        .await?
        .filter(|a| a.is_active())
        .ok_or_else(not_found)?;

    if !state.access.can_access(&asset, user.user_id).await? {
        tracing::debug!(asset.id = %id, user.id = user.user_id, "Asset access denied");
        return Err(AppError::Forbidden(
            "You do not have access to this asset".to_string(),
        ));
    }

    Ok(asset)
}

/// Groups whose assets appear in the caller's listings. Membership is authoritative; a
/// non-empty `x-group-ids` header only narrows the result.
pub(crate) async fn visible_groups(
    state: &AppState,
    user: &UserContext,
) -> Result<Vec<i64>, AppError> {
    let mut groups = state.access.visible_groups(user.user_id).await?;
    if !user.group_ids.is_empty() {
        groups.retain(|g| user.group_ids.contains(g));
    }
    Ok(groups)
}
