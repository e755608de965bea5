//! Route configuration

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and text parts on top of the file limit.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 10_000;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(
        state
            .max_upload_size_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HTTP_CONCURRENCY_LIMIT)
        .max(1);
    tracing::info!(http_concurrency_limit, "HTTP concurrency limit layer enabled");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(public_routes())
        .merge(asset_routes())
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .route(
            "/assets/job/{job_id}",
            get(handlers::jobs::get_job_status),
        )
}

fn asset_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assets", get(handlers::assets::list_assets))
        .route("/assets/search", get(handlers::assets::search_assets))
        .route("/assets/upload", post(handlers::upload::upload_assets))
        .route("/assets/delete", post(handlers::assets::delete_assets))
        .route(
            "/assets/metadata-fields",
            get(handlers::metadata::list_metadata_fields),
        )
        .route("/assets/file/{id}", get(handlers::files::get_asset_file))
        .route("/assets/{id}", get(handlers::assets::get_asset))
        .route(
            "/assets/{id}/metadata",
            get(handlers::metadata::get_asset_metadata).post(handlers::metadata::save_asset_metadata),
        )
}
