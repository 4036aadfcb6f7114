use crate::{AppState, handlers::organizations};
use axum::{Router, routing::get};

/// Organization Router
///
/// Admins manage organizations; members see their own organization with
/// admin-only fields scrubbed.
pub fn organization_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/{id}",
            get(organizations::read_organization)
                .head(organizations::organization_exists)
                .put(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route(
            "/organizations/{id}/versions",
            get(organizations::read_organization_versions),
        )
        .route(
            "/organizations/{id}/versions/{versionid}",
            get(organizations::read_organization_version)
                .delete(organizations::delete_organization_version),
        )
        // GET /organizations/{id}/users
        // Members of the organization, in user ID order.
        .route(
            "/organizations/{id}/users",
            get(organizations::list_organization_users),
        )
        .route(
            "/organization_statuses",
            get(organizations::organization_statuses),
        )
}
