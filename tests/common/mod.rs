#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use entity_api::{
    AppConfig, AppState, MemoryRepository, MockStorageService, RepositoryState, StorageState,
    Store, create_router,
    models::{ADMIN_ROLE, Token, User, UserStatus},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

/// TestApp
///
/// The full router over an in-memory repository and mock storage. The store
/// is shared with the router so tests can seed and inspect data directly.
pub struct TestApp {
    pub router: Router,
    pub store: Store,
    pub storage: MockStorageService,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn id(&self) -> String {
        self.body["id"].as_str().unwrap_or_default().to_string()
    }

    pub fn ids(&self) -> Vec<String> {
        self.body
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(AppConfig::default(), MockStorageService::new())
    }

    pub fn with(config: AppConfig, storage: MockStorageService) -> Self {
        let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
        let state = AppState::new(repo, Arc::new(storage.clone()) as StorageState, config);
        let store = state.store.clone();
        Self {
            router: create_router(state),
            store,
            storage,
        }
    }

    pub async fn seed_user(&self, email: &str, roles: &[&str], status: UserStatus) -> User {
        self.store
            .users
            .create(User {
                email: email.to_string(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
                status,
                ..User::default()
            })
            .await
            .expect("seed user")
    }

    pub async fn issue_token(&self, user_id: &str) -> String {
        self.store
            .tokens
            .create(Token {
                user_id: user_id.to_string(),
                expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
                ..Token::default()
            })
            .await
            .expect("seed token")
            .id
    }

    /// An enabled admin and its bearer token.
    pub async fn admin(&self) -> (User, String) {
        let user = self
            .seed_user("admin@example.com", &[ADMIN_ROLE], UserStatus::Enabled)
            .await;
        let token = self.issue_token(&user.id).await;
        (user, token)
    }

    /// An enabled user without roles and its bearer token.
    pub async fn member(&self, email: &str) -> (User, String) {
        let user = self.seed_user(email, &[], UserStatus::Enabled).await;
        let token = self.issue_token(&user.id).await;
        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, bearer, None).await
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, bearer, Some(body)).await
    }

    pub async fn put(&self, uri: &str, bearer: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, bearer, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, bearer, None).await
    }

    pub async fn head(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.request(Method::HEAD, uri, bearer, None).await
    }
}
