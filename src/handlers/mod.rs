use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    config::AppConfig,
    error::ApiError,
    pagination::{PageQuery, PageRequest, parse_bool},
    table::{Entity, Table},
    tuid::Tuid,
};

pub mod devices;
pub mod emails;
pub mod events;
pub mod images;
pub mod metrics;
pub mod organizations;
pub mod tokens;
pub mod tuids;
pub mod users;

// --- Shared Handler Helpers ---

/// Validates a path ID. Syntax errors are 400s; existence is checked by the store.
pub fn parse_id(raw: &str) -> Result<String, ApiError> {
    parse_tuid("id", raw)
}

pub fn parse_version_id(raw: &str) -> Result<String, ApiError> {
    parse_tuid("versionid", raw)
}

fn parse_tuid(name: &str, raw: &str) -> Result<String, ApiError> {
    raw.parse::<Tuid>()
        .map(|id| id.to_string())
        .map_err(|e| ApiError::BadRequest(format!("invalid parameter, {name}: {e}")))
}

/// Checks a whole-document body against the ID in the path. An omitted body ID
/// is taken from the path.
pub fn reconcile_id(path_id: &str, body_id: &mut String) -> Result<(), ApiError> {
    if body_id.is_empty() {
        *body_id = path_id.to_string();
        Ok(())
    } else if body_id.as_str() == path_id {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "body id {body_id} does not match path id {path_id}"
        )))
    }
}

/// created
///
/// 201 with a `Location` header pointing at the new resource.
pub fn created<T: Serialize>(collection: &str, id: &str, body: T) -> Response {
    let location = format!("/v1/{collection}/{id}");
    (
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(body),
    )
        .into_response()
}

/// Parses the page parameters with the configured default page size.
pub fn page_request(
    config: &AppConfig,
    query: &PageQuery,
    default_reverse: bool,
) -> Result<PageRequest, ApiError> {
    Ok(PageRequest::parse(
        query,
        default_reverse,
        config.default_page_limit,
    )?)
}

/// Parses an optional boolean query flag (`any`, `sorted`).
pub fn query_flag(name: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(false),
        Some(value) => parse_bool(value)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid parameter, {name}: {value}"))),
    }
}

/// Validates a `date` filter (YYYY-MM-DD).
pub fn date_filter(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|date| Some(date.format("%Y-%m-%d").to_string()))
            .map_err(|_| ApiError::BadRequest(format!("invalid parameter, date: {value}"))),
    }
}

/// Selection
///
/// How a list endpoint picks its IDs: a full scan, one secondary index, or a
/// term search over the `search` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Index(&'static str, String),
    Search { query: String, any: bool },
}

impl Selection {
    /// The first filter with a non-empty value wins, in the order given.
    pub fn from_filters(filters: &[(&'static str, Option<&str>)]) -> Self {
        filters
            .iter()
            .find_map(|(name, value)| {
                value
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| Selection::Index(*name, v.to_string()))
            })
            .unwrap_or(Selection::All)
    }

    /// Search takes precedence over index filters.
    pub fn with_search(self, query: Option<&str>, any: bool) -> Self {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => Selection::Search {
                query: query.to_string(),
                any,
            },
            None => self,
        }
    }
}

/// list_entities
///
/// Runs a selection as one cursor page.
pub async fn list_entities<T: Entity>(
    table: &Table<T>,
    selection: &Selection,
    page: &PageRequest,
) -> Result<Vec<T>, ApiError> {
    let found = match selection {
        Selection::All => table.read_all(page).await?,
        Selection::Index(index, value) => table.read_by_index(index, value, page).await?,
        Selection::Search { query, any } => table.search(query, *any, page).await?,
    };
    Ok(found)
}

/// list_sorted
///
/// Runs a selection over the whole table and orders it by `key` instead of by
/// ID. The cursor offset does not apply; `reverse` and `limit` do.
pub async fn list_sorted<T, K, F>(
    table: &Table<T>,
    selection: &Selection,
    page: &PageRequest,
    key: F,
) -> Result<Vec<T>, ApiError>
where
    T: Entity,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut found = list_entities(table, selection, &PageRequest::unbounded()).await?;
    found.sort_by(|a, b| key(a).cmp(&key(b)).then_with(|| a.id().cmp(b.id())));
    if page.reverse {
        found.reverse();
    }
    found.truncate(page.limit);
    Ok(found)
}

/// route_not_found
///
/// Router fallback, so unknown paths also answer with the error envelope.
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}
