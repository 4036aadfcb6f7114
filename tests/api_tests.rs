mod common;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware,
    routing::get,
};
use common::TestApp;
use entity_api::{
    AppConfig, AppState, MemoryRepository, MockStorageService, RepositoryState, StorageState,
    audit, models::UserStatus,
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use tower_http::timeout::TimeoutLayer;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_user_requires_authentication() {
    let app = TestApp::new();
    let response = app
        .post("/v1/users", None, json!({ "email": "a@example.com" }))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], 401);
    assert_eq!(response.body["uri"], "/v1/users");
    assert_eq!(response.body["logLevel"], "WARN");
    assert!(response.body.get("eventID").is_none());
}

#[tokio::test]
async fn test_create_user_returns_location() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;

    let response = app
        .post(
            "/v1/users",
            Some(&admin),
            json!({ "email": "Ada@Example.com", "roles": ["editor", "editor"] }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let id = response.id();
    assert_eq!(response.location(), Some(format!("/v1/users/{id}").as_str()));
    assert_eq!(response.body["email"], "ada@example.com");
    assert_eq!(response.body["roles"], json!(["editor"]));
    assert_eq!(response.body["status"], "PENDING");
    assert!(response.body["versionID"].as_str().is_some_and(|v| !v.is_empty()));
}

#[tokio::test]
async fn test_create_user_rejects_duplicate_email_and_bad_input() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;

    let first = app
        .post("/v1/users", Some(&admin), json!({ "email": "dup@example.com" }))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let duplicate = app
        .post("/v1/users", Some(&admin), json!({ "email": "DUP@example.com" }))
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let invalid = app
        .post("/v1/users", Some(&admin), json!({ "email": "not-an-address" }))
        .await;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(invalid.body["code"], 422);

    let malformed = app
        .request(
            axum::http::Method::POST,
            "/v1/users",
            Some(&admin),
            Some(json!("just a string")),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_users_by_role() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let editor = app
        .seed_user("ed@example.com", &["editor"], UserStatus::Enabled)
        .await;
    app.seed_user("viewer@example.com", &["viewer"], UserStatus::Enabled)
        .await;

    let response = app.get("/v1/users?role=editor", Some(&admin)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.ids(), vec![editor.id]);

    let everyone = app.get("/v1/users", Some(&admin)).await;
    assert_eq!(everyone.ids().len(), 3);

    let roles = app.get("/v1/user_roles", Some(&admin)).await;
    assert_eq!(roles.body, json!(["admin", "editor", "viewer"]));
}

#[tokio::test]
async fn test_list_users_sorted_by_email() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    app.seed_user("zed@example.com", &[], UserStatus::Pending).await;
    app.seed_user("bob@example.com", &[], UserStatus::Pending).await;

    let response = app.get("/v1/users?sorted=true&limit=2", Some(&admin)).await;
    let emails: Vec<&str> = response
        .body
        .as_array()
        .map(|users| users.iter().filter_map(|u| u["email"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(emails, vec!["admin@example.com", "bob@example.com"]);
}

#[tokio::test]
async fn test_pagination_cursor_and_bad_limit() {
    let app = TestApp::new();
    let (admin_user, admin) = app.admin().await;
    let second = app.seed_user("b@example.com", &[], UserStatus::Pending).await;
    let third = app.seed_user("c@example.com", &[], UserStatus::Pending).await;

    let first_page = app.get("/v1/users?limit=2", Some(&admin)).await;
    assert_eq!(first_page.ids(), vec![admin_user.id.clone(), second.id.clone()]);

    let next_page = app
        .get(&format!("/v1/users?limit=2&offset={}", second.id), Some(&admin))
        .await;
    assert_eq!(next_page.ids(), vec![third.id.clone()]);

    let newest = app.get("/v1/users?reverse=true&limit=1", Some(&admin)).await;
    assert_eq!(newest.ids(), vec![third.id]);

    let bad = app.get("/v1/users?limit=0", Some(&admin)).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert!(
        bad.body["message"]
            .as_str()
            .is_some_and(|m| m.contains("limit"))
    );
}

#[tokio::test]
async fn test_head_get_and_repeated_delete() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let user = app.seed_user("gone@example.com", &[], UserStatus::Pending).await;
    let uri = format!("/v1/users/{}", user.id);

    assert_eq!(app.head(&uri, Some(&admin)).await.status, StatusCode::NO_CONTENT);
    let read = app.get(&uri, Some(&admin)).await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["email"], "gone@example.com");

    assert_eq!(app.delete(&uri, Some(&admin)).await.status, StatusCode::OK);
    assert_eq!(app.delete(&uri, Some(&admin)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, Some(&admin)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.head(&uri, Some(&admin)).await.status, StatusCode::NOT_FOUND);

    // History survives the delete.
    let versions = app.get(&format!("{uri}/versions"), Some(&admin)).await;
    assert_eq!(versions.body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_delete_user_revokes_tokens() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (member, member_token) = app.member("leaving@example.com").await;

    let response = app
        .delete(&format!("/v1/users/{}", member.id), Some(&admin))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!app.store.tokens.exists(&member_token).await.unwrap());
}

#[tokio::test]
async fn test_versions_are_ordered_and_pageable() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let user = app.seed_user("v@example.com", &[], UserStatus::Pending).await;
    let uri = format!("/v1/users/{}", user.id);

    for name in ["One", "Two"] {
        let response = app
            .put(
                &uri,
                Some(&admin),
                json!({ "email": "v@example.com", "displayName": name }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["id"], user.id.as_str());
        assert_eq!(response.body["createdAt"], json!(user.created_at));
    }

    let ascending = app.get(&format!("{uri}/versions"), Some(&admin)).await;
    let names: Vec<&str> = ascending
        .body
        .as_array()
        .map(|v| v.iter().filter_map(|u| u["displayName"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["", "One", "Two"]);

    let descending = app
        .get(&format!("{uri}/versions?reverse=true&limit=2"), Some(&admin))
        .await;
    let names: Vec<&str> = descending
        .body
        .as_array()
        .map(|v| v.iter().filter_map(|u| u["displayName"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["Two", "One"]);
}

#[tokio::test]
async fn test_delete_version_protects_current() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let user = app.seed_user("cv@example.com", &[], UserStatus::Pending).await;
    let uri = format!("/v1/users/{}", user.id);

    let updated = app
        .put(&uri, Some(&admin), json!({ "email": "cv@example.com", "notes": "x" }))
        .await;
    let current = updated.body["versionID"].as_str().unwrap_or_default().to_string();

    let conflict = app
        .delete(&format!("{uri}/versions/{current}"), Some(&admin))
        .await;
    assert_eq!(conflict.status, StatusCode::CONFLICT);

    let old = app
        .delete(&format!("{uri}/versions/{}", user.version_id), Some(&admin))
        .await;
    assert_eq!(old.status, StatusCode::OK);

    let missing = app
        .get(&format!("{uri}/versions/{}", user.version_id), Some(&admin))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_rejects_mismatched_body_id() {
    let app = TestApp::new();
    let (admin_user, admin) = app.admin().await;
    let user = app.seed_user("m@example.com", &[], UserStatus::Pending).await;

    let response = app
        .put(
            &format!("/v1/users/{}", user.id),
            Some(&admin),
            json!({ "id": admin_user.id, "email": "m@example.com" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_path_id_is_bad_request() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;

    let response = app.get("/v1/users/not-a-tuid", Some(&admin)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(
        response.body["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("invalid parameter, id: parse error"))
    );
}

#[tokio::test]
async fn test_members_see_only_themselves() {
    let app = TestApp::new();
    let (member, token) = app.member("me@example.com").await;
    let other = app.seed_user("other@example.com", &[], UserStatus::Enabled).await;

    let own = app.get(&format!("/v1/users/{}", member.id), Some(&token)).await;
    assert_eq!(own.status, StatusCode::OK);

    let theirs = app.get(&format!("/v1/users/{}", other.id), Some(&token)).await;
    assert_eq!(theirs.status, StatusCode::FORBIDDEN);

    let listing = app.get("/v1/users", Some(&token)).await;
    assert_eq!(listing.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_members_cannot_grant_themselves_roles() {
    let app = TestApp::new();
    let (member, token) = app.member("climber@example.com").await;

    let response = app
        .put(
            &format!("/v1/users/{}", member.id),
            Some(&token),
            json!({
                "email": "climber@example.com",
                "displayName": "Climber",
                "roles": ["admin"],
                "status": "DISABLED"
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["displayName"], "Climber");
    assert_eq!(response.body["roles"], json!([]));
    assert_eq!(response.body["status"], "ENABLED");
}

#[tokio::test]
async fn test_tuids() {
    let app = TestApp::new();

    let fresh = app.get("/v1/tuids", None).await;
    assert_eq!(fresh.status, StatusCode::OK);
    let id = fresh.id();
    assert_eq!(id.len(), 22);

    let decoded = app.get(&format!("/v1/tuids/{id}"), None).await;
    assert_eq!(decoded.body, fresh.body);

    let bad = app.get("/v1/tuids/bad", None).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert!(
        bad.body["message"]
            .as_str()
            .is_some_and(|m| m.contains("parse error"))
    );
}

#[tokio::test]
async fn test_undecodable_path_segment_uses_error_envelope() {
    let app = TestApp::new();
    let response = app.get("/v1/tuids/%FF%FE", None).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], 400);
    assert_eq!(response.body["uri"], "/v1/tuids/%FF%FE");
    assert!(
        response.body["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("invalid path parameter"))
    );
}

#[tokio::test]
async fn test_unsupported_method_uses_error_envelope() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let response = app
        .request(Method::PATCH, "/v1/users", Some(&admin), None)
        .await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.body["code"], 405);
    assert_eq!(response.body["message"], "Method Not Allowed");
    assert_eq!(response.body["uri"], "/v1/users");
    assert!(response.headers.contains_key(header::ALLOW));
}

#[tokio::test]
async fn test_request_timeout_uses_error_envelope() {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let state = AppState::new(repo, storage, AppConfig::default());

    // Same layering as the application router: timeout inside the audit trail.
    let router = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .layer(TimeoutLayer::new(Duration::from_millis(20)))
        .layer(middleware::from_fn_with_state(state.clone(), audit::audit_trail))
        .with_state(state);

    let response = router
        .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 408);
    assert_eq!(body["message"], "request timed out");
    assert_eq!(body["logLevel"], "WARN");
    assert_eq!(body["uri"], "/slow");
}

#[tokio::test]
async fn test_email_history_follows_current_recipient() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (first, first_token) = app.member("first@example.com").await;
    let (second, second_token) = app.member("second@example.com").await;

    let message = |user_id: &str| {
        json!({
            "userID": user_id,
            "recipient": "first@example.com",
            "subject": "Welcome",
            "body": "Hello"
        })
    };
    let email = app.post("/v1/emails", Some(&admin), message(&first.id)).await;
    let original_version = email.body["versionID"].as_str().unwrap_or_default().to_string();
    let uri = format!("/v1/emails/{}", email.id());

    let moved = app.put(&uri, Some(&admin), message(&second.id)).await;
    assert_eq!(moved.status, StatusCode::OK);

    let versions = app.get(&format!("{uri}/versions"), Some(&second_token)).await;
    assert_eq!(versions.status, StatusCode::OK);
    assert_eq!(versions.ids().len(), 2);
    assert_eq!(
        app.get(&format!("{uri}/versions/{original_version}"), Some(&second_token))
            .await
            .status,
        StatusCode::OK
    );

    assert_eq!(
        app.get(&format!("{uri}/versions"), Some(&first_token))
            .await
            .status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get(&format!("{uri}/versions/{original_version}"), Some(&first_token))
            .await
            .status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let app = TestApp::new();
    let response = app.get("/v1/nothing/here?x=1", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["code"], 404);
    assert_eq!(response.body["uri"], "/v1/nothing/here?x=1");
    assert_eq!(response.body["logLevel"], "INFO");
}

#[tokio::test]
async fn test_enumerations_are_public() {
    let app = TestApp::new();

    let statuses = app.get("/v1/user_statuses", None).await;
    assert_eq!(statuses.body, json!(["PENDING", "ENABLED", "DISABLED"]));

    let emails = app.get("/v1/email_statuses", None).await;
    assert_eq!(emails.status, StatusCode::OK);
    let orgs = app.get("/v1/organization_statuses", None).await;
    assert_eq!(orgs.status, StatusCode::OK);
}

#[tokio::test]
async fn test_device_put_recreates_missing_device() {
    let app = TestApp::new();

    let created = app
        .post("/v1/devices", None, json!({ "userAgent": "curl/8" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert!(created.body.get("userID").is_none());
    let device_id = created.id();

    let refreshed = app
        .put(
            &format!("/v1/devices/{device_id}"),
            None,
            json!({ "userAgent": "curl/9" }),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.id(), device_id);

    let unknown = entity_api::tuid::Tuid::new().to_string();
    let recreated = app
        .put(
            &format!("/v1/devices/{unknown}"),
            None,
            json!({ "userAgent": "curl/9" }),
        )
        .await;
    assert_eq!(recreated.status, StatusCode::CREATED);
    assert_ne!(recreated.id(), unknown);
    assert_eq!(
        recreated.location(),
        Some(format!("/v1/devices/{}", recreated.id()).as_str())
    );
}

#[tokio::test]
async fn test_device_client_ip_is_private() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (_, token) = app.member("owner@example.com").await;

    let created = app
        .request(
            axum::http::Method::POST,
            "/v1/devices",
            Some(&token),
            Some(json!({ "userAgent": "phone" })),
        )
        .await;
    let uri = format!("/v1/devices/{}", created.id());

    let anonymous = app.get(&uri, None).await;
    assert_eq!(anonymous.body["clientIP"], "");
    assert_eq!(app.head(&uri, None).await.status, StatusCode::NO_CONTENT);

    let as_admin = app.get(&uri, Some(&admin)).await;
    assert_eq!(as_admin.status, StatusCode::OK);
    assert_eq!(app.delete(&uri, Some(&token)).await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_organization_search_and_members() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;

    let acme = app
        .post(
            "/v1/organizations",
            Some(&admin),
            json!({ "name": "Acme Rocket Works", "notes": "owes us money" }),
        )
        .await;
    assert_eq!(acme.status, StatusCode::CREATED);
    let globex = app
        .post("/v1/organizations", Some(&admin), json!({ "name": "Globex Rocket" }))
        .await;

    let all_terms = app
        .get("/v1/organizations?search=rocket%20acme", Some(&admin))
        .await;
    assert_eq!(all_terms.ids(), vec![acme.id()]);

    let any_term = app
        .get("/v1/organizations?search=acme%20globex&any=true", Some(&admin))
        .await;
    assert_eq!(any_term.ids(), vec![acme.id(), globex.id()]);

    let member = app
        .post(
            "/v1/users",
            Some(&admin),
            json!({ "email": "emp@acme.test", "orgID": acme.id(), "status": "ENABLED" }),
        )
        .await;
    let member_token = app.issue_token(&member.id()).await;

    let as_member = app
        .get(&format!("/v1/organizations/{}", acme.id()), Some(&member_token))
        .await;
    assert_eq!(as_member.status, StatusCode::OK);
    assert_eq!(as_member.body["notes"], "");

    let outsider = app
        .get(&format!("/v1/organizations/{}", globex.id()), Some(&member_token))
        .await;
    assert_eq!(outsider.status, StatusCode::FORBIDDEN);

    let users = app
        .get(&format!("/v1/organizations/{}/users", acme.id()), Some(&admin))
        .await;
    assert_eq!(users.ids(), vec![member.id()]);
}

#[tokio::test]
async fn test_tokens_issue_and_logout() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let user = app.seed_user("t@example.com", &[], UserStatus::Enabled).await;

    let missing_user = app
        .post(
            "/v1/tokens",
            Some(&admin),
            json!({ "userID": entity_api::tuid::Tuid::new().to_string() }),
        )
        .await;
    assert_eq!(missing_user.status, StatusCode::UNPROCESSABLE_ENTITY);

    let issued = app
        .post(
            "/v1/tokens",
            Some(&admin),
            json!({ "userID": user.id, "ttlSeconds": 60 }),
        )
        .await;
    assert_eq!(issued.status, StatusCode::CREATED);
    let token = issued.id();

    let me = app.get(&format!("/v1/users/{}", user.id), Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);

    let logout = app.delete(&format!("/v1/tokens/{token}"), Some(&token)).await;
    assert_eq!(logout.status, StatusCode::OK);

    // The token is gone, so the request is anonymous.
    let after = app.get(&format!("/v1/users/{}", user.id), Some(&token)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metrics_attribute_caller() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (member, token) = app.member("gauge@example.com").await;

    let anonymous = app
        .post(
            "/v1/metrics",
            None,
            json!({ "name": "page_view", "value": 1.0, "userID": member.id }),
        )
        .await;
    assert_eq!(anonymous.status, StatusCode::CREATED);
    assert!(anonymous.body.get("userID").is_none());

    let attributed = app
        .post(
            "/v1/metrics",
            Some(&token),
            json!({ "name": "page_view", "value": 2.0, "tags": ["Web"] }),
        )
        .await;
    assert_eq!(attributed.body["userID"], member.id.as_str());

    let tagged = app.get("/v1/metrics?tag=web", Some(&admin)).await;
    assert_eq!(tagged.ids(), vec![attributed.id()]);

    let tags = app.get("/v1/metric_tags", Some(&admin)).await;
    assert_eq!(tags.body, json!(["page_view", "web"]));

    let forbidden = app.get("/v1/metrics", Some(&token)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_emails_are_visible_to_recipient() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (member, token) = app.member("rcpt@example.com").await;
    let (_, stranger) = app.member("stranger@example.com").await;

    let email = app
        .post(
            "/v1/emails",
            Some(&admin),
            json!({
                "userID": member.id,
                "recipient": "rcpt@example.com",
                "subject": "Welcome",
                "body": "Hello"
            }),
        )
        .await;
    assert_eq!(email.status, StatusCode::CREATED);
    let uri = format!("/v1/emails/{}", email.id());

    assert_eq!(app.get(&uri, Some(&token)).await.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&stranger)).await.status, StatusCode::FORBIDDEN);
    assert_eq!(
        app.post("/v1/emails", Some(&token), json!({})).await.status,
        StatusCode::FORBIDDEN
    );

    let sent = app
        .put(
            &uri,
            Some(&admin),
            json!({
                "userID": member.id,
                "recipient": "rcpt@example.com",
                "subject": "Welcome",
                "body": "Hello",
                "status": "SENT"
            }),
        )
        .await;
    assert_eq!(sent.body["status"], "SENT");

    let by_status = app.get("/v1/emails?status=sent", Some(&admin)).await;
    assert_eq!(by_status.ids(), vec![email.id()]);
}

#[tokio::test]
async fn test_events_record_mutations() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (_, member) = app.member("watcher@example.com").await;

    let created = app
        .post("/v1/users", Some(&admin), json!({ "email": "new@example.com" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let events = app.get("/v1/events?level=info", Some(&admin)).await;
    assert_eq!(events.status, StatusCode::OK);
    let newest = &events.body[0];
    assert_eq!(newest["logLevel"], "INFO");
    assert_eq!(newest["method"], "POST");
    assert_eq!(newest["uri"], "/v1/users");
    assert_eq!(newest["code"], 201);

    assert_eq!(
        app.get("/v1/events", Some(&member)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get("/v1/events", None).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/v1/events?level=fatal", Some(&admin)).await.status,
        StatusCode::BAD_REQUEST
    );
}
