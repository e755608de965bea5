use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use damflow_core::StorageTier;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
}

/// Database and storage reachability. Storage problems degrade the report without
/// failing it, since uploads to the other tier may still work.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service healthy", body = HealthCheckResponse),
        (status = 503, description = "Database unreachable", body = HealthCheckResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut response = HealthCheckResponse {
        status: "healthy".to_string(),
        database: "not_configured".to_string(),
        storage: "unknown".to_string(),
    };
    let mut healthy = true;

    if let Some(pool) = &state.pool {
        match tokio::time::timeout(CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
            Ok(Ok(_)) => response.database = "healthy".to_string(),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Database health check failed");
                response.database = format!("unhealthy: {}", e);
                healthy = false;
            }
            Err(_) => {
                tracing::error!("Database health check timed out");
                response.database = "timeout".to_string();
                healthy = false;
            }
        }
    }

    let mut degraded = Vec::new();
    for tier in StorageTier::ALL {
        let dir = state.locator.tier_dir(tier);
        match tokio::time::timeout(CHECK_TIMEOUT, tokio::fs::try_exists(&dir)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(tier = %tier, error = %e, "Storage health check warning");
                degraded.push(format!("{}: {}", tier, e));
            }
            Err(_) => {
                tracing::warn!(tier = %tier, "Storage health check timed out");
                degraded.push(format!("{}: timeout", tier));
            }
        }
    }
    response.storage = if degraded.is_empty() {
        "healthy".to_string()
    } else {
        format!("degraded: {}", degraded.join(", "))
    };

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        response.status = "unhealthy".to_string();
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
