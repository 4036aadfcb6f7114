/// Router Module Index
///
/// One router per resource, all nested under `/v1`. Access control lives in
/// the handlers' extractors (`Caller`, `AuthUser`, `AdminUser`); a router only
/// adds a `route_layer` when every route in it shares the same guard.
pub mod devices;
pub mod emails;
pub mod events;
pub mod images;
pub mod metrics;
pub mod organizations;
pub mod tokens;
pub mod tuids;
pub mod users;

use crate::AppState;
use axum::{Router, routing::get};

/// Unversioned routes: liveness only.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Used by load balancers; never touches the store.
        .route("/health", get(|| async { "ok" }))
}

/// Every versioned resource, mounted by `create_router` under `/v1`.
pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .merge(users::user_routes())
        .merge(organizations::organization_routes())
        .merge(devices::device_routes())
        .merge(images::image_routes())
        .merge(emails::email_routes())
        .merge(metrics::metric_routes())
        .merge(tokens::token_routes())
        .merge(tuids::tuid_routes())
        .merge(events::event_routes())
}
