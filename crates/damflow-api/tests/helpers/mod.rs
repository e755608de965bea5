//! Test helpers: build AppState and router for integration tests.
//!
//! Stores are in memory and storage lives in a temporary directory, so the tests need
//! neither Postgres nor the external preview tools (only images and placeholder
//! documents are processed).

#![allow(dead_code)]

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use damflow_api::setup::routes;
use damflow_api::state::{AppDependencies, AppState};
use damflow_core::models::{Backoff, RetryPolicy};
use damflow_core::{StorageTier, ToolSettings};
use damflow_db::memory::{MemoryAssetStore, MemoryJobStore, StaticMembership};
use damflow_storage::StorageLocator;
use damflow_worker::JobQueueConfig;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const USER_HEADER: &str = "x-user-id";
pub const GROUPS_HEADER: &str = "x-group-ids";

pub const MAX_UPLOAD_BYTES: u64 = 1024 * 1024;

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub assets: Arc<MemoryAssetStore>,
    pub jobs: Arc<MemoryJobStore>,
    pub storage: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn tier_dir(&self, tier: StorageTier) -> PathBuf {
        self.storage.path().join(tier.dir_name())
    }

    /// Files currently in a tier's `uploads/` directory (previews excluded).
    pub fn uploaded_files(&self, tier: StorageTier) -> Vec<String> {
        let dir = self.tier_dir(tier).join("uploads");
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(StaticMembership::new()).await
}

/// App whose group membership is fixed by `membership`.
pub async fn setup_test_app_with(membership: StaticMembership) -> TestApp {
    let storage = TempDir::new().expect("Failed to create storage dir");
    let assets = Arc::new(MemoryAssetStore::new());
    let jobs = Arc::new(MemoryJobStore::new());

    let queue = JobQueueConfig {
        max_workers: 2,
        poll_interval_ms: 20,
        default_policy: RetryPolicy {
            attempts: 3,
            backoff: Backoff::Fixed { delay_ms: 0 },
            ..RetryPolicy::default()
        },
        stale_reap_interval_secs: 0,
        ..JobQueueConfig::default()
    };

    let state = AppState::new(AppDependencies {
        assets: assets.clone(),
        jobs: jobs.clone(),
        membership: Arc::new(membership),
        locator: StorageLocator::new(storage.path(), StorageTier::Storage1),
        tools: ToolSettings::default(),
        queue,
        max_upload_size_bytes: MAX_UPLOAD_BYTES,
        pool: None,
    });

    let app = routes::setup_routes(state.clone());
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        assets,
        jobs,
        storage,
    }
}

/// Multipart part for a file with the given name and MIME type.
pub fn file_part(data: Vec<u8>, name: &str, mime_type: &str) -> Part {
    Part::bytes(data)
        .file_name(name.to_string())
        .mime_type(mime_type.to_string())
}

/// Uploads a single file as `user` and returns the parsed response body.
pub async fn upload_file(
    client: &TestServer,
    user: i64,
    data: Vec<u8>,
    name: &str,
    mime_type: &str,
) -> Value {
    let form = MultipartForm::new().add_part("file", file_part(data, name, mime_type));
    let response = client
        .post("/assets/upload")
        .add_header(USER_HEADER, user.to_string())
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 200, "upload failed: {}", response.text());
    response.json::<Value>()
}

pub fn job_id(upload: &Value, index: usize) -> String {
    upload["files"][index]["job_id"]
        .as_str()
        .expect("Expected job_id in upload response")
        .to_string()
}

/// Polls the job until it finishes. Returns every status observed, last one final.
pub async fn wait_for_job(client: &TestServer, job_id: &str) -> Vec<Value> {
    let mut seen = Vec::new();
    for _ in 0..250 {
        let response = client.get(&format!("/assets/job/{}", job_id)).await;
        assert_eq!(response.status_code(), 200);
        let status = response.json::<Value>();
        let state = status["state"].as_str().unwrap_or_default().to_string();
        seen.push(status);
        if state == "completed" || state == "failed" {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Job {} did not finish: {:?}", job_id, seen.last());
}

/// Uploads a file and waits for it to become an asset. Returns the asset id.
pub async fn upload_and_process(
    client: &TestServer,
    user: i64,
    data: Vec<u8>,
    name: &str,
    mime_type: &str,
) -> String {
    let upload = upload_file(client, user, data, name, mime_type).await;
    let id = job_id(&upload, 0);
    let history = wait_for_job(client, &id).await;
    let last = history.last().expect("at least one status");
    assert_eq!(last["state"], "completed", "job failed: {}", last);
    last["result"]["asset_id"]
        .as_str()
        .expect("Expected asset_id in job result")
        .to_string()
}
