mod helpers;

use axum_test::multipart::MultipartForm;
use axum_test::TestServer;
use damflow_core::GroupPermission;
use damflow_db::memory::StaticMembership;
use helpers::fixtures::{create_test_png, text_file};
use helpers::{
    file_part, job_id, setup_test_app, setup_test_app_with, wait_for_job, GROUPS_HEADER,
    USER_HEADER,
};
use serde_json::Value;

/// Uploads one file with optional group and keywords, waits for processing and returns
/// the asset id.
async fn upload_with(
    client: &TestServer,
    user: i64,
    group: Option<i64>,
    keywords: &str,
    part: (Vec<u8>, &str, &str),
) -> String {
    let (data, name, mime_type) = part;
    let mut form = MultipartForm::new();
    if let Some(group) = group {
        form = form.add_text("group_id", group.to_string());
    }
    let form = form
        .add_part("file", file_part(data, name, mime_type))
        .add_text("keywords", keywords.to_string());
    let response = client
        .post("/assets/upload")
        .add_header(USER_HEADER, user.to_string())
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let history = wait_for_job(client, &job_id(&response.json::<Value>(), 0)).await;
    let last = history.last().unwrap();
    assert_eq!(last["state"], "completed", "{}", last);
    last["result"]["asset_id"].as_str().unwrap().to_string()
}

fn ids(page: &Value) -> Vec<String> {
    page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_search_filters_by_name_type_and_keywords() {
    let app = setup_test_app().await;
    let client = app.client();

    let photo = upload_with(
        client,
        1,
        None,
        "Sea, sunset",
        (create_test_png(16, 16), "harbour.png", "image/png"),
    )
    .await;
    let notes = upload_with(
        client,
        1,
        None,
        "sea",
        (text_file("tide table"), "harbour-notes.txt", "text/plain"),
    )
    .await;
    upload_with(
        client,
        1,
        None,
        "forest",
        (text_file("trail"), "trail.txt", "text/plain"),
    )
    .await;

    let page: Value = client
        .get("/assets/search?name=HARBOUR&keywords=sea&sort_by=name&order=asc")
        .add_header(USER_HEADER, "1")
        .await
        .json();
    assert_eq!(ids(&page), vec![notes.clone(), photo.clone()]);
    assert_eq!(page["pagination"]["total"], 2);
    assert_eq!(page["pagination"]["page"], 1);
    assert_eq!(page["pagination"]["limit"], 20);
    assert_eq!(page["pagination"]["total_pages"], 1);

    let page: Value = client
        .get("/assets/search?type=image")
        .add_header(USER_HEADER, "1")
        .await
        .json();
    assert_eq!(ids(&page), vec![photo]);

    let page: Value = client
        .get("/assets/search?type=document&keywords=sun,forest")
        .add_header(USER_HEADER, "1")
        .await
        .json();
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["original_filename"], "trail.txt");
    assert!(!ids(&page).contains(&notes));
}

#[tokio::test]
async fn test_search_pages_results() {
    let app = setup_test_app().await;
    let client = app.client();
    for name in ["a.txt", "b.txt", "c.txt"] {
        upload_with(client, 2, None, "", (text_file(name), name, "text/plain")).await;
    }

    let page: Value = client
        .get("/assets/search?sortBy=name&order=DESC&limit=2&page=2")
        .add_header(USER_HEADER, "2")
        .await
        .json();
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["total_pages"], 2);
    let data = page["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["filename"], "a.txt");

    let response = client
        .get("/assets/search?limit=500")
        .add_header(USER_HEADER, "2")
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "INVALID_INPUT");

    let response = client.get("/assets/search").await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_group_header_cannot_grant_access() {
    let membership = StaticMembership::new()
        .with(5, 1, GroupPermission::Admin)
        .with(5, 2, GroupPermission::Viewer);
    let app = setup_test_app_with(membership).await;
    let client = app.client();

    let shared = upload_with(
        client,
        1,
        Some(5),
        "plan",
        (text_file("roadmap"), "roadmap.txt", "text/plain"),
    )
    .await;

    // User 9 is not in group 5, whatever the header claims.
    let listing: Value = client
        .get("/assets")
        .add_header(USER_HEADER, "9")
        .add_header(GROUPS_HEADER, "5")
        .await
        .json();
    assert!(listing.as_array().unwrap().is_empty());

    let page: Value = client
        .get("/assets/search")
        .add_header(USER_HEADER, "9")
        .add_header(GROUPS_HEADER, "5")
        .await
        .json();
    assert_eq!(page["pagination"]["total"], 0);

    // A real member sees it without any header, and a header naming other groups
    // narrows it away.
    let listing: Value = client
        .get("/assets")
        .add_header(USER_HEADER, "2")
        .await
        .json();
    let listed: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![shared.as_str()]);

    let listing: Value = client
        .get("/assets")
        .add_header(USER_HEADER, "2")
        .add_header(GROUPS_HEADER, "6")
        .await
        .json();
    assert!(listing.as_array().unwrap().is_empty());
}
