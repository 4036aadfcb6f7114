use crate::{AppState, handlers::tuids};
use axum::{Router, routing::get};

/// TUID Router
///
/// Stateless helpers for generating and decoding identifiers.
pub fn tuid_routes() -> Router<AppState> {
    Router::new()
        .route("/tuids", get(tuids::new_tuid))
        .route("/tuids/{id}", get(tuids::read_tuid))
}
