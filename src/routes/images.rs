use crate::{AppState, handlers::images};
use axum::{
    Router,
    routing::{get, post},
};

/// Image Router
///
/// Image metadata is versioned like any other entity. The bytes live in object
/// storage and move through presigned URLs, so the API never proxies uploads.
pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/images", get(images::list_images).post(images::create_image))
        .route(
            "/images/{id}",
            get(images::read_image)
                .head(images::image_exists)
                .put(images::update_image)
                .delete(images::delete_image),
        )
        .route("/images/{id}/versions", get(images::read_image_versions))
        .route(
            "/images/{id}/versions/{versionid}",
            get(images::read_image_version).delete(images::delete_image_version),
        )
        // POST /images/{id}/upload
        // Presigned PUT for the owner (or an admin).
        .route("/images/{id}/upload", post(images::upload_image))
        // GET /images/{id}/download
        // Presigned GET for any authenticated caller.
        .route("/images/{id}/download", get(images::download_image))
        .route("/image_tags", get(images::image_tags))
}
