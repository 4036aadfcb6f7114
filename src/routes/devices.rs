use crate::{AppState, handlers::devices};
use axum::{Router, routing::get};

/// Device Router
///
/// Registration, lookup and refresh are open to anonymous clients; listing,
/// deletion and history are admin-only.
pub fn device_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/devices",
            get(devices::list_devices).post(devices::create_device),
        )
        .route(
            "/devices/{id}",
            get(devices::read_device)
                .head(devices::device_exists)
                // PUT re-registers an expired device under a new ID.
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route("/devices/{id}/versions", get(devices::read_device_versions))
        .route(
            "/devices/{id}/versions/{versionid}",
            get(devices::read_device_version).delete(devices::delete_device_version),
        )
}
