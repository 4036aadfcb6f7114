use crate::{AppState, handlers::emails};
use axum::{Router, routing::get};

/// Email Router
///
/// The outbound message log. Only admins write it; recipients may read their own.
pub fn email_routes() -> Router<AppState> {
    Router::new()
        .route("/emails", get(emails::list_emails).post(emails::create_email))
        .route(
            "/emails/{id}",
            get(emails::read_email)
                .head(emails::email_exists)
                .put(emails::update_email)
                .delete(emails::delete_email),
        )
        .route("/emails/{id}/versions", get(emails::read_email_versions))
        .route(
            "/emails/{id}/versions/{versionid}",
            get(emails::read_email_version).delete(emails::delete_email_version),
        )
        .route("/email_statuses", get(emails::email_statuses))
}
