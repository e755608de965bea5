mod helpers;

use axum_test::multipart::MultipartForm;
use damflow_core::{GroupPermission, StorageTier};
use damflow_db::memory::StaticMembership;
use helpers::fixtures::{create_test_png, sha256_hex, text_file};
use helpers::{
    file_part, job_id, setup_test_app, setup_test_app_with, upload_and_process, wait_for_job,
    USER_HEADER,
};
use serde_json::Value;

#[tokio::test]
async fn test_upload_png_becomes_asset_with_thumbnail() {
    let app = setup_test_app().await;
    let client = app.client();

    let asset_id =
        upload_and_process(client, 7, create_test_png(64, 48), "photo.png", "image/png").await;

    let response = client
        .get(&format!("/assets/{}", asset_id))
        .add_header(USER_HEADER, "7")
        .await;
    assert_eq!(response.status_code(), 200);
    let asset: Value = response.json();
    assert_eq!(asset["original_filename"], "photo.png");
    assert_eq!(asset["file_type"], "image/png");
    assert_eq!(asset["storage_tier"], "DAM_STORAGE1");
    assert_eq!(asset["owner_user_id"], 7);

    let thumbnail = asset["thumbnail"].as_str().expect("Expected a thumbnail");
    assert!(thumbnail.starts_with("uploads/thumbnails/thumb_"));
    assert!(thumbnail.ends_with(".png"));
    assert!(app.tier_dir(StorageTier::Storage1).join(thumbnail).exists());

    let id = asset_id.parse().unwrap();
    assert_eq!(
        app.assets.metadata_value(id, "category").as_deref(),
        Some("image/png")
    );
    assert_eq!(
        app.assets.metadata_value(id, "title").as_deref(),
        Some("photo.png")
    );
}

#[tokio::test]
async fn test_upload_returns_receipt_per_file() {
    let app = setup_test_app().await;
    let data = text_file("quarterly numbers");

    let form = MultipartForm::new()
        .add_part("file", file_part(data.clone(), "report.txt", "text/plain"))
        .add_text("checksum", sha256_hex(&data));
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "1")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["original_filename"], "report.txt");
    assert_eq!(files[0]["checksum"], sha256_hex(&data));
    assert_ne!(files[0]["filename"], "report.txt");
    assert_eq!(app.jobs.jobs().len(), 1);
}

#[tokio::test]
async fn test_checksum_mismatch_discards_every_file() {
    let app = setup_test_app().await;
    let first = text_file("first");
    let second = text_file("second");

    let form = MultipartForm::new()
        .add_part("file", file_part(first.clone(), "a.txt", "text/plain"))
        .add_part("file", file_part(second, "b.txt", "text/plain"))
        .add_text("checksum", sha256_hex(&first))
        .add_text("checksum", sha256_hex(b"something else"));
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "1")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "CHECKSUM_MISMATCH");
    assert!(app.jobs.jobs().is_empty());
    assert!(app.uploaded_files(StorageTier::Storage1).is_empty());
}

#[tokio::test]
async fn test_same_name_uploads_get_distinct_stored_names() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("file", file_part(text_file("one"), "notes.txt", "text/plain"))
        .add_part("file", file_part(text_file("two"), "notes.txt", "text/plain"));
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "1")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_ne!(files[0]["filename"], files[1]["filename"]);
    assert_eq!(app.uploaded_files(StorageTier::Storage1).len(), 2);
}

#[tokio::test]
async fn test_upload_without_identity_is_unauthorized() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_part(
        "file",
        file_part(text_file("x"), "x.txt", "text/plain"),
    );
    let response = app.client().post("/assets/upload").multipart(form).await;

    assert_eq!(response.status_code(), 401);
    assert!(app.jobs.jobs().is_empty());
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text("description", "nothing attached");
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "1")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_group_upload_requires_membership() {
    let membership = StaticMembership::new().with(5, 2, GroupPermission::Member);
    let app = setup_test_app_with(membership).await;

    let outsider = MultipartForm::new()
        .add_text("group_id", "5")
        .add_part("file", file_part(text_file("x"), "x.txt", "text/plain"));
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "3")
        .multipart(outsider)
        .await;
    assert_eq!(response.status_code(), 403);
    assert!(app.jobs.jobs().is_empty());
    assert!(app.uploaded_files(StorageTier::Storage1).is_empty());

    let member = MultipartForm::new()
        .add_text("group_id", "5")
        .add_part("file", file_part(text_file("x"), "x.txt", "text/plain"));
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "2")
        .multipart(member)
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let history = wait_for_job(app.client(), &job_id(&body, 0)).await;
    assert_eq!(history.last().unwrap()["state"], "completed");
    let asset = &app.assets.assets()[0];
    assert_eq!(asset.group_id, Some(5));
    assert_eq!(asset.owner_user_id, 2);
}

#[tokio::test]
async fn test_storage_field_selects_tier() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_text("storage", "DAM_STORAGE2")
        .add_part("file", file_part(text_file("x"), "x.txt", "text/plain"));
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "1")
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let history = wait_for_job(app.client(), &job_id(&body, 0)).await;
    let last = history.last().unwrap();
    assert_eq!(last["state"], "completed");
    assert_eq!(last["result"]["storage_tier"], "DAM_STORAGE2");

    assert_eq!(app.uploaded_files(StorageTier::Storage2).len(), 1);
    assert!(app.uploaded_files(StorageTier::Storage1).is_empty());
}

#[tokio::test]
async fn test_upload_over_size_limit_is_rejected() {
    let app = setup_test_app().await;
    let data = vec![b'a'; helpers::MAX_UPLOAD_BYTES as usize + 1];

    let form = MultipartForm::new().add_part("file", file_part(data, "big.txt", "text/plain"));
    let response = app
        .client()
        .post("/assets/upload")
        .add_header(USER_HEADER, "1")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 413);
    assert!(app.jobs.jobs().is_empty());
    assert!(app.uploaded_files(StorageTier::Storage1).is_empty());
}
