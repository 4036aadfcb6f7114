use crate::{AppState, handlers::users};
use axum::{Router, routing::get};

/// User Router
///
/// Admins manage accounts; an enabled user may read and update their own.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::read_user)
                .head(users::user_exists)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/versions", get(users::read_user_versions))
        .route(
            "/users/{id}/versions/{versionid}",
            get(users::read_user_version).delete(users::delete_user_version),
        )
        // Enumerations
        .route("/user_statuses", get(users::user_statuses))
        .route("/user_roles", get(users::user_roles))
}
