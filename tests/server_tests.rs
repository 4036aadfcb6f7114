use entity_api::{
    AppConfig, AppState, MemoryRepository, MockStorageService, RepositoryState, StorageState,
    create_router,
    models::{ADMIN_ROLE, Token, User, UserStatus},
};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub admin_token: String,
}

/// Serves the full stack on an ephemeral port, with one admin seeded.
async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let state = AppState::new(repo, storage, AppConfig::default());

    let admin = state
        .store
        .users
        .create(User {
            email: "root@example.com".to_string(),
            roles: vec![ADMIN_ROLE.to_string()],
            status: UserStatus::Enabled,
            ..User::default()
        })
        .await
        .expect("seed admin");
    let token = state
        .store
        .tokens
        .create(Token {
            user_id: admin.id,
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            ..Token::default()
        })
        .await
        .expect("seed token");

    let router = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().expect("local addr").port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server");
    });

    TestApp {
        address: format!("http://127.0.0.1:{port}"),
        admin_token: token.id,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::get(format!("{}/health", app.address))
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let document: serde_json::Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .expect("req fail")
        .json()
        .await
        .expect("json");
    assert!(document["paths"]["/v1/users/{id}"].is_object());
    assert!(document["components"]["securitySchemes"]["bearer"].is_object());
}

#[tokio::test]
async fn test_user_round_trip_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{}/v1/users", app.address))
        .bearer_auth(&app.admin_token)
        .json(&serde_json::json!({ "email": "http@example.com" }))
        .send()
        .await
        .expect("post fail");
    assert_eq!(created.status(), 201);
    let location = created
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .expect("location header");
    let user: User = created.json().await.expect("user json");
    assert_eq!(location, format!("/v1/users/{}", user.id));

    let read: User = client
        .get(format!("{}{location}", app.address))
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .expect("get fail")
        .json()
        .await
        .expect("user json");
    assert_eq!(read, user);

    let exists = client
        .head(format!("{}{location}", app.address))
        .bearer_auth(&app.admin_token)
        .send()
        .await
        .expect("head fail");
    assert_eq!(exists.status(), 204);
}

#[tokio::test]
async fn test_cors_exposes_location() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .get(format!("{}/v1/user_statuses", app.address))
        .header("origin", "http://example.com")
        .send()
        .await
        .expect("req fail");
    let exposed = response
        .headers()
        .get("access-control-expose-headers")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    assert!(exposed.contains("location"));
}
