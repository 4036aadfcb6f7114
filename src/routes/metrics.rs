use crate::{AppState, handlers::metrics};
use axum::{Router, routing::get};

/// Metric Router
///
/// Measurements are write-once: there is no PUT and no version history.
pub fn metric_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/metrics",
            get(metrics::list_metrics).post(metrics::create_metric),
        )
        .route(
            "/metrics/{id}",
            get(metrics::read_metric)
                .head(metrics::metric_exists)
                .delete(metrics::delete_metric),
        )
        .route("/metric_tags", get(metrics::metric_tags))
}
