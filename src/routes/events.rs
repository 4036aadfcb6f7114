use crate::{AppState, auth, handlers::events, models::ADMIN_ROLE};
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::get,
};

/// Event Router
///
/// The audit trail. Every route here is admin-only, so the role check is applied
/// once as a route layer rather than in each handler.
pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(events::list_events))
        .route(
            "/events/{id}",
            get(events::read_event).delete(events::delete_event),
        )
        .route_layer(middleware::from_fn(|request: Request, next: Next| {
            auth::require_role(ADMIN_ROLE, request, next)
        }))
}
