use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

use super::{Selection, created, date_filter, list_entities, page_request, parse_id};
use crate::{
    AppState,
    auth::{AdminUser, Caller},
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ErrorEnvelope},
    models::Metric,
    pagination::PageQuery,
};

/// MetricFilter
///
/// Filters for GET /v1/metrics. A metric's name is also one of its tags.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetricFilter {
    pub tag: Option<String>,
    pub date: Option<String>,
}

/// create_metric
///
/// [Anyone] Records a measurement, attributed to the caller when authenticated.
#[utoipa::path(
    post,
    path = "/v1/metrics",
    request_body = Metric,
    responses(
        (status = 201, description = "Created", body = Metric),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    )
)]
pub async fn create_metric(
    caller: Caller,
    State(state): State<AppState>,
    ApiJson(mut metric): ApiJson<Metric>,
) -> Result<Response, ApiError> {
    if !caller.is_admin() {
        metric.user_id = caller.user_id().map(str::to_string);
    }
    let metric = state.store.metrics.create(metric).await?;
    Ok(created("metrics", &metric.id, metric.clone()))
}

/// list_metrics
///
/// [Admin] Lists measurements by tag or date.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    params(PageQuery, MetricFilter),
    responses((status = 200, description = "Metrics", body = [Metric])),
    security(("bearer" = []))
)]
pub async fn list_metrics(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<MetricFilter>,
) -> Result<Json<Vec<Metric>>, ApiError> {
    let page = page_request(&state.config, &query, false)?;
    let date = date_filter(filter.date.as_deref())?;
    let tag = filter.tag.as_deref().map(str::to_lowercase);
    let selection = Selection::from_filters(&[("tag", tag.as_deref()), ("date", date.as_deref())]);
    Ok(Json(
        list_entities(&state.store.metrics, &selection, &page).await?,
    ))
}

/// read_metric
///
/// [Admin] Returns a measurement.
#[utoipa::path(
    get,
    path = "/v1/metrics/{id}",
    params(("id" = String, Path, description = "Metric ID")),
    responses(
        (status = 200, description = "Metric", body = Metric),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_metric(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Metric>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.metrics.read(&id).await?))
}

/// metric_exists
///
/// [Admin] 204 if the measurement exists.
#[utoipa::path(
    head,
    path = "/v1/metrics/{id}",
    params(("id" = String, Path, description = "Metric ID")),
    responses((status = 204, description = "Exists"), (status = 404, description = "Not Found")),
    security(("bearer" = []))
)]
pub async fn metric_exists(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.store.metrics.exists(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("metric", &id))
    }
}

/// delete_metric
///
/// [Admin] Deletes a measurement.
#[utoipa::path(
    delete,
    path = "/v1/metrics/{id}",
    params(("id" = String, Path, description = "Metric ID")),
    responses(
        (status = 200, description = "Deleted", body = Metric),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_metric(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Metric>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.metrics.delete(&id).await?))
}

/// metric_tags
///
/// [Admin] Every tag (including metric names) currently in use.
#[utoipa::path(
    get,
    path = "/v1/metric_tags",
    responses((status = 200, description = "Tags", body = [String])),
    security(("bearer" = []))
)]
pub async fn metric_tags(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.metrics.read_index_values("tag").await?))
}
