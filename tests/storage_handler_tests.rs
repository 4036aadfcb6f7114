mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use entity_api::{AppConfig, MockStorageService, models::UserStatus};
use serde_json::{Value, json};

fn image_body(file_name: &str) -> Value {
    json!({
        "title": "Launch Day",
        "fileName": file_name,
        "contentType": "image/png",
        "fileSize": 2048,
        "tags": ["Launch"]
    })
}

#[tokio::test]
async fn test_image_lifecycle_with_presigned_urls() {
    let app = TestApp::new();
    let (owner, token) = app.member("owner@example.com").await;

    let created = app
        .post("/v1/images", Some(&token), image_body("launch.png"))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["ownerID"], owner.id.as_str());
    let id = created.id();

    let upload = app
        .request(Method::POST, &format!("/v1/images/{id}/upload"), Some(&token), None)
        .await;
    assert_eq!(upload.status, StatusCode::OK);
    assert_eq!(upload.body["resourceKey"], format!("images/{id}/launch.png"));
    assert!(
        upload.body["url"]
            .as_str()
            .is_some_and(|url| url.ends_with("method=PUT"))
    );

    let download = app
        .get(&format!("/v1/images/{id}/download"), Some(&token))
        .await;
    assert!(
        download.body["url"]
            .as_str()
            .is_some_and(|url| url.ends_with("method=GET"))
    );

    let deleted = app.delete(&format!("/v1/images/{id}"), Some(&token)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(
        app.storage.deleted_keys(),
        vec![format!("images/{id}/launch.png")]
    );
}

#[tokio::test]
async fn test_image_validation() {
    let app = TestApp::new();
    let (_, token) = app.member("owner@example.com").await;

    let traversal = app
        .post("/v1/images", Some(&token), image_body("../secrets.png"))
        .await;
    assert_eq!(traversal.status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut not_an_image = image_body("notes.txt");
    not_an_image["contentType"] = json!("text/plain");
    let rejected = app.post("/v1/images", Some(&token), not_an_image).await;
    assert_eq!(rejected.status, StatusCode::UNPROCESSABLE_ENTITY);

    let anonymous = app.post("/v1/images", None, image_body("a.png")).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_image_file_name_is_immutable() {
    let app = TestApp::new();
    let (_, token) = app.member("owner@example.com").await;
    let created = app
        .post("/v1/images", Some(&token), image_body("a.png"))
        .await;
    let uri = format!("/v1/images/{}", created.id());

    let renamed = app.put(&uri, Some(&token), image_body("b.png")).await;
    assert_eq!(renamed.status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut retitled = image_body("a.png");
    retitled["title"] = json!("Second Launch");
    let updated = app.put(&uri, Some(&token), retitled).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["title"], "Second Launch");
}

#[tokio::test]
async fn test_only_owner_or_admin_may_modify_images() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (_, owner) = app.member("owner@example.com").await;
    let (_, other) = app.member("other@example.com").await;

    let created = app
        .post("/v1/images", Some(&owner), image_body("a.png"))
        .await;
    let id = created.id();

    // Any authenticated caller may look.
    assert_eq!(
        app.get(&format!("/v1/images/{id}"), Some(&other)).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.request(Method::POST, &format!("/v1/images/{id}/upload"), Some(&other), None)
            .await
            .status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.delete(&format!("/v1/images/{id}"), Some(&other))
            .await
            .status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.delete(&format!("/v1/images/{id}"), Some(&admin))
            .await
            .status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_image_search_and_tags() {
    let app = TestApp::new();
    let (_, token) = app.member("owner@example.com").await;

    let launch = app
        .post("/v1/images", Some(&token), image_body("launch.png"))
        .await;
    let mut other = image_body("harbor.jpg");
    other["title"] = json!("Harbor at Night");
    other["contentType"] = json!("image/jpeg");
    other["tags"] = json!(["night"]);
    app.post("/v1/images", Some(&token), other).await;

    let found = app.get("/v1/images?search=launch", Some(&token)).await;
    assert_eq!(found.ids(), vec![launch.id()]);

    let tags = app.get("/v1/image_tags", Some(&token)).await;
    assert_eq!(tags.body, json!(["launch", "night"]));
}

#[tokio::test]
async fn test_storage_failure_is_an_audited_internal_error() {
    let app = TestApp::with(AppConfig::default(), MockStorageService::new_failing());
    let (_, admin) = app.admin().await;
    let created = app
        .post("/v1/images", Some(&admin), image_body("a.png"))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let upload = app
        .request(
            Method::POST,
            &format!("/v1/images/{}/upload", created.id()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(upload.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(upload.body["message"], "internal server error");
    assert_eq!(upload.body["logLevel"], "ERROR");

    let event_id = upload.body["eventID"].as_str().unwrap_or_default();
    assert!(!event_id.is_empty());

    let event = app.get(&format!("/v1/events/{event_id}"), Some(&admin)).await;
    assert_eq!(event.status, StatusCode::OK);
    assert_eq!(event.body["logLevel"], "ERROR");
    assert_eq!(event.body["code"], 500);
    assert!(
        event.body["message"]
            .as_str()
            .is_some_and(|m| m.contains("mock storage error"))
    );
}

#[tokio::test]
async fn test_failed_object_delete_becomes_warning() {
    let app = TestApp::with(AppConfig::default(), MockStorageService::new_failing());
    let (_, admin) = app.admin().await;
    let created = app
        .post("/v1/images", Some(&admin), image_body("a.png"))
        .await;

    let deleted = app
        .delete(&format!("/v1/images/{}", created.id()), Some(&admin))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let warnings = app.get("/v1/events?level=WARN", Some(&admin)).await;
    let warning = &warnings.body[0];
    assert_eq!(warning["logLevel"], "WARN");
    assert_eq!(warning["method"], "DELETE");
    assert!(
        warning["message"]
            .as_str()
            .is_some_and(|m| m.contains(&created.id()))
    );

    // The metadata is gone regardless.
    let user = app
        .seed_user("late@example.com", &[], UserStatus::Enabled)
        .await;
    let token = app.issue_token(&user.id).await;
    assert_eq!(
        app.get(&format!("/v1/images/{}", created.id()), Some(&token))
            .await
            .status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_image_versions_page_past_the_end_is_empty() {
    let app = TestApp::new();
    let (_, token) = app.member("owner@example.com").await;
    let created = app
        .post("/v1/images", Some(&token), image_body("a.png"))
        .await;
    let id = created.id();
    let version_id = created.body["versionID"].as_str().unwrap_or_default();

    let all = app.get(&format!("/v1/images/{id}/versions"), Some(&token)).await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.ids(), vec![id.clone()]);

    let past_end = app
        .get(
            &format!("/v1/images/{id}/versions?offset={version_id}"),
            Some(&token),
        )
        .await;
    assert_eq!(past_end.status, StatusCode::OK);
    assert_eq!(past_end.body, json!([]));

    let unknown = entity_api::tuid::Tuid::new().to_string();
    let missing = app
        .get(&format!("/v1/images/{unknown}/versions"), Some(&token))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_image_history_follows_ownership_transfer() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (_, former) = app.member("former@example.com").await;
    let (new_owner, current) = app.member("new@example.com").await;

    let created = app
        .post("/v1/images", Some(&former), image_body("a.png"))
        .await;
    let id = created.id();
    let first_version = created.body["versionID"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let mut transfer = image_body("a.png");
    transfer["ownerID"] = json!(new_owner.id);
    let moved = app
        .put(&format!("/v1/images/{id}"), Some(&admin), transfer)
        .await;
    assert_eq!(moved.status, StatusCode::OK);
    assert_eq!(moved.body["ownerID"], new_owner.id.as_str());

    let versions_uri = format!("/v1/images/{id}/versions");
    let first_uri = format!("{versions_uri}/{first_version}");

    let history = app.get(&versions_uri, Some(&current)).await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.ids().len(), 2);
    assert_eq!(app.get(&first_uri, Some(&current)).await.status, StatusCode::OK);

    assert_eq!(
        app.get(&versions_uri, Some(&former)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get(&first_uri, Some(&former)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.delete(&first_uri, Some(&former)).await.status,
        StatusCode::FORBIDDEN
    );

    // After deletion the newest version still decides who may read the history.
    app.delete(&format!("/v1/images/{id}"), Some(&current)).await;
    assert_eq!(
        app.get(&versions_uri, Some(&current)).await.status,
        StatusCode::OK
    );
    assert_eq!(
        app.get(&versions_uri, Some(&former)).await.status,
        StatusCode::FORBIDDEN
    );
}
