use axum::{
    Router,
    body::Body,
    extract::FromRef,
    http::{HeaderName, Request},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Identifiers, paging and the error envelope shared by every resource.
pub mod error;
pub mod pagination;
pub mod tuid;

// Persistence: the document repository and the typed tables over it.
pub mod repository;
pub mod table;

// Core application services and components.
pub mod audit;
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod storage;

// One router per resource.
pub mod routes;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

use models::{Device, Email, Event, Image, Metric, Organization, Token, User};
use table::Table;

/// ApiDoc
///
/// Auto-generates the OpenAPI document served at `/api-docs/openapi.json`
/// from the `#[utoipa::path]` annotations on the handlers.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::users::create_user, handlers::users::list_users, handlers::users::read_user,
        handlers::users::user_exists, handlers::users::update_user, handlers::users::delete_user,
        handlers::users::read_user_versions, handlers::users::read_user_version,
        handlers::users::delete_user_version, handlers::users::user_statuses,
        handlers::users::user_roles,
        handlers::organizations::create_organization, handlers::organizations::list_organizations,
        handlers::organizations::read_organization, handlers::organizations::organization_exists,
        handlers::organizations::update_organization, handlers::organizations::delete_organization,
        handlers::organizations::read_organization_versions,
        handlers::organizations::read_organization_version,
        handlers::organizations::delete_organization_version,
        handlers::organizations::list_organization_users,
        handlers::organizations::organization_statuses,
        handlers::devices::create_device, handlers::devices::list_devices,
        handlers::devices::read_device, handlers::devices::device_exists,
        handlers::devices::update_device, handlers::devices::delete_device,
        handlers::devices::read_device_versions, handlers::devices::read_device_version,
        handlers::devices::delete_device_version,
        handlers::images::create_image, handlers::images::list_images, handlers::images::read_image,
        handlers::images::image_exists, handlers::images::update_image,
        handlers::images::delete_image,
        handlers::images::read_image_versions, handlers::images::read_image_version,
        handlers::images::delete_image_version, handlers::images::upload_image,
        handlers::images::download_image, handlers::images::image_tags,
        handlers::emails::create_email, handlers::emails::list_emails, handlers::emails::read_email,
        handlers::emails::email_exists, handlers::emails::update_email,
        handlers::emails::delete_email,
        handlers::emails::read_email_versions, handlers::emails::read_email_version,
        handlers::emails::delete_email_version, handlers::emails::email_statuses,
        handlers::metrics::create_metric, handlers::metrics::list_metrics,
        handlers::metrics::read_metric, handlers::metrics::metric_exists,
        handlers::metrics::delete_metric, handlers::metrics::metric_tags,
        handlers::tokens::create_token, handlers::tokens::list_tokens, handlers::tokens::read_token,
        handlers::tokens::token_exists, handlers::tokens::delete_token,
        handlers::tuids::new_tuid, handlers::tuids::read_tuid,
        handlers::events::list_events, handlers::events::read_event, handlers::events::delete_event,
    ),
    components(
        schemas(
            User, models::UserStatus, Organization, models::OrganizationStatus, Device, Image,
            Email, models::EmailStatus, Metric, Token, models::CreateTokenRequest, Event,
            models::PresignedUrl, tuid::TuidInfo, error::ErrorEnvelope, error::LogLevel,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "entity-api", description = "Versioned entity REST API")
    )
)]
pub struct ApiDoc;

/// Registers the bearer token scheme in the generated document.
struct BearerAuth;

impl utoipa::Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// Store
///
/// One typed table per resource, all sharing the same repository.
#[derive(Clone)]
pub struct Store {
    pub users: Table<User>,
    pub organizations: Table<Organization>,
    pub devices: Table<Device>,
    pub images: Table<Image>,
    pub emails: Table<Email>,
    pub metrics: Table<Metric>,
    pub tokens: Table<Token>,
    pub events: Table<Event>,
}

impl Store {
    pub fn new(repo: RepositoryState) -> Self {
        Self {
            users: Table::new(repo.clone()),
            organizations: Table::new(repo.clone()),
            devices: Table::new(repo.clone()),
            images: Table::new(repo.clone()),
            emails: Table::new(repo.clone()),
            metrics: Table::new(repo.clone()),
            tokens: Table::new(repo.clone()),
            events: Table::new(repo),
        }
    }
}

/// AppState
///
/// The single container of application services and configuration, built once
/// in `main` and shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Typed tables over the versioned document repository.
    pub store: Store,
    /// Object storage for image bytes.
    pub storage: StorageState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        Self {
            store: Store::new(repo),
            storage,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for Store {
    fn from_ref(app_state: &AppState) -> Store {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every resource router and applies the middleware stack. From the
/// outside in: CORS, request ID, tracing, audit trail, timeout, bearer
/// authentication, then the per-route role guards and handlers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::header::LOCATION]);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Application Router Assembly
    let app_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::public_routes())
        .nest("/v1", routes::v1_routes())
        .fallback(handlers::route_not_found)
        // Bearer identity is attached to every request before routing to handlers.
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        // Abandon handlers (and their store calls) that run too long. Inside the
        // audit trail, so the bare 408 still leaves in the envelope.
        .layer(TimeoutLayer::new(state.config.request_timeout))
        // The audit trail wraps authentication so it also finalizes 401 envelopes.
        .layer(middleware::from_fn_with_state(state.clone(), audit::audit_trail))
        .with_state(state.clone());

    // 3. Observability and Correlation Layers (Applied outermost)
    app_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: spans carry the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `TraceLayer` span, tagging it with the `x-request-id` header so
/// every log line for one request is correlated.
fn trace_span_logger(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
