//! Cleanup and soft-delete job handlers.

use damflow_core::models::{
    CleanupPayload, CleanupResult, SoftDeleteFailure, SoftDeletePayload, SoftDeleteResult,
};
use damflow_core::JobError;
use damflow_db::AssetStore;
use damflow_storage::StorageLocator;

/// Deletes the listed files. Paths outside a tier directory of the storage root are
/// refused. Individual failures are collected, never raised.
#[tracing::instrument(skip(locator, payload), fields(files = payload.files.len()))]
pub async fn run_cleanup(locator: &StorageLocator, payload: &CleanupPayload) -> CleanupResult {
    let mut result = CleanupResult::default();

    for path in &payload.files {
        let tier = if locator.contains(path) {
            locator.parse_tier(path)
        } else {
            None
        };
        let Some(tier) = tier else {
            tracing::warn!(path = %path.display(), "Refusing to delete file outside storage tiers");
            result
                .failed
                .push(format!("{}: outside storage tiers", path.display()));
            continue;
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), tier = %tier, "Deleted file");
                result.deleted += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete file");
                result.failed.push(format!("{}: {}", path.display(), e));
            }
        }
    }

    tracing::info!(
        deleted = result.deleted,
        failed = result.failed.len(),
        "Cleanup finished"
    );
    result
}

/// Marks each listed asset deleted. The job fails only when every update errored, so
/// a single unreachable row does not hide the ones that went through.
#[tracing::instrument(skip(assets, payload), fields(assets = payload.asset_ids.len()))]
pub async fn run_soft_delete(
    assets: &dyn AssetStore,
    payload: &SoftDeletePayload,
) -> Result<SoftDeleteResult, JobError> {
    let mut result = SoftDeleteResult::default();

    for id in &payload.asset_ids {
        match assets.soft_delete(*id).await {
            Ok(true) => result.deleted.push(*id),
            Ok(false) => result.not_found.push(*id),
            Err(e) => {
                tracing::warn!(asset.id = %id, error = %e, "Failed to soft-delete asset");
                result.failed.push(SoftDeleteFailure {
                    id: *id,
                    error: e.to_string(),
                });
            }
        }
    }

    if !payload.asset_ids.is_empty() && result.failed.len() == payload.asset_ids.len() {
        return Err(JobError::retryable(anyhow::anyhow!(
            "All {} soft-delete updates failed: {}",
            result.failed.len(),
            result.failed[0].error
        )));
    }

    tracing::info!(
        deleted = result.deleted.len(),
        not_found = result.not_found.len(),
        failed = result.failed.len(),
        "Soft delete finished"
    );
    Ok(result)
}
