//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;

use anyhow::{Context, Result};
use damflow_core::Config;
use damflow_db::{AssetRepository, JobRepository, PgGroupMembership};
use damflow_storage::StorageLocator;
use damflow_worker::JobQueueConfig;
use std::sync::Arc;

use crate::state::{AppDependencies, AppState};

/// Connects the database, prepares storage, starts the worker pool and builds the router.
pub async fn initialize_app(config: &Config) -> Result<(Arc<AppState>, axum::Router)> {
    let pool = database::setup_database(config).await?;

    let locator = StorageLocator::new(config.storage.root.clone(), config.storage.default_tier);
    locator
        .ensure_directories(config.storage.default_tier)
        .await
        .context("Failed to prepare storage directories")?;

    let queue = JobQueueConfig::from_settings(&config.queue);
    tracing::info!(
        max_workers = queue.max_workers,
        poll_interval_ms = queue.poll_interval_ms,
        max_attempts = queue.default_policy.attempts,
        "Job queue configured"
    );

    let state = AppState::new(AppDependencies {
        assets: Arc::new(AssetRepository::new(pool.clone())),
        jobs: Arc::new(JobRepository::new(pool.clone())),
        membership: Arc::new(PgGroupMembership::new(pool.clone())),
        locator,
        tools: config.tools.clone(),
        queue,
        max_upload_size_bytes: config.storage.max_upload_size_bytes,
        pool: Some(pool),
    });

    let router = routes::setup_routes(state.clone());
    Ok((state, router))
}
