use axum::{
    Json,
    extract::State,
};
use serde::Deserialize;

use super::{Selection, date_filter, list_entities, page_request, parse_id};
use crate::{
    AppState,
    error::{ApiError, ApiPath, ApiQuery, ErrorEnvelope, LogLevel},
    models::Event,
    pagination::PageQuery,
};

const LEVELS: [LogLevel; 4] = [
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warn,
    LogLevel::Error,
];

/// EventFilter
///
/// Filters for GET /v1/events.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventFilter {
    /// DEBUG, INFO, WARN or ERROR.
    pub level: Option<String>,
    pub date: Option<String>,
}

fn level_filter(raw: Option<&str>) -> Result<Option<&'static str>, ApiError> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    LEVELS
        .iter()
        .map(LogLevel::as_str)
        .find(|name| name.eq_ignore_ascii_case(raw))
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid parameter, level: {raw}")))
}

/// list_events
///
/// [Admin] Lists audit events, newest first unless `reverse=false`.
#[utoipa::path(
    get,
    path = "/v1/events",
    params(PageQuery, EventFilter),
    responses(
        (status = 200, description = "Events", body = [Event]),
        (status = 400, description = "Bad Request", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let page = page_request(&state.config, &query, true)?;
    let level = level_filter(filter.level.as_deref())?;
    let date = date_filter(filter.date.as_deref())?;
    let selection = Selection::from_filters(&[("level", level), ("date", date.as_deref())]);
    Ok(Json(
        list_entities(&state.store.events, &selection, &page).await?,
    ))
}

/// read_event
///
/// [Admin] Returns one event, typically looked up by the `eventID` of an error envelope.
#[utoipa::path(
    get,
    path = "/v1/events/{id}",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event", body = Event),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Event>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.events.read(&id).await?))
}

/// delete_event
///
/// [Admin] Deletes an event.
#[utoipa::path(
    delete,
    path = "/v1/events/{id}",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Deleted", body = Event),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Event>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.events.delete(&id).await?))
}
