use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

use super::{
    Selection, created, date_filter, list_entities, page_request, parse_id, parse_version_id,
    reconcile_id,
};
use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ErrorEnvelope},
    models::{Email, EmailStatus},
    pagination::PageQuery,
};

/// EmailFilter
///
/// Filters for GET /v1/emails.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailFilter {
    /// User ID the message was sent for.
    pub user: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
}

/// create_email
///
/// [Admin] Records an outbound message.
#[utoipa::path(
    post,
    path = "/v1/emails",
    request_body = Email,
    responses(
        (status = 201, description = "Created", body = Email),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn create_email(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(email): ApiJson<Email>,
) -> Result<Response, ApiError> {
    let email = state.store.emails.create(email).await?;
    Ok(created("emails", &email.id, email.clone()))
}

/// list_emails
///
/// [Admin] Lists messages by user, status or date.
#[utoipa::path(
    get,
    path = "/v1/emails",
    params(PageQuery, EmailFilter),
    responses((status = 200, description = "Emails", body = [Email])),
    security(("bearer" = []))
)]
pub async fn list_emails(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<EmailFilter>,
) -> Result<Json<Vec<Email>>, ApiError> {
    let page = page_request(&state.config, &query, false)?;
    let date = date_filter(filter.date.as_deref())?;
    let status = filter.status.as_deref().map(str::to_uppercase);
    let selection = Selection::from_filters(&[
        ("user", filter.user.as_deref()),
        ("status", status.as_deref()),
        ("date", date.as_deref()),
    ]);
    Ok(Json(
        list_entities(&state.store.emails, &selection, &page).await?,
    ))
}

/// read_email
///
/// [Owner or Admin] Returns a message.
#[utoipa::path(
    get,
    path = "/v1/emails/{id}",
    params(("id" = String, Path, description = "Email ID")),
    responses(
        (status = 200, description = "Email", body = Email),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_email(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Email>, ApiError> {
    let id = parse_id(&id)?;
    let email = state.store.emails.read(&id).await?;
    identity.ensure_owner_or_admin(&email.user_id)?;
    Ok(Json(email))
}

/// email_exists
///
/// [Owner or Admin] 204 if the message exists.
#[utoipa::path(
    head,
    path = "/v1/emails/{id}",
    params(("id" = String, Path, description = "Email ID")),
    responses((status = 204, description = "Exists"), (status = 404, description = "Not Found")),
    security(("bearer" = []))
)]
pub async fn email_exists(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let email = state.store.emails.read(&id).await?;
    identity.ensure_owner_or_admin(&email.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// update_email
///
/// [Admin] Whole-document replacement, typically to record delivery status.
#[utoipa::path(
    put,
    path = "/v1/emails/{id}",
    params(("id" = String, Path, description = "Email ID")),
    request_body = Email,
    responses(
        (status = 200, description = "Updated", body = Email),
        (status = 400, description = "Bad Request", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn update_email(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(mut email): ApiJson<Email>,
) -> Result<Json<Email>, ApiError> {
    let id = parse_id(&id)?;
    reconcile_id(&id, &mut email.id)?;
    Ok(Json(state.store.emails.update(email).await?))
}

/// delete_email
///
/// [Admin] Deletes a message.
#[utoipa::path(
    delete,
    path = "/v1/emails/{id}",
    params(("id" = String, Path, description = "Email ID")),
    responses(
        (status = 200, description = "Deleted", body = Email),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_email(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Email>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.emails.delete(&id).await?))
}

/// read_email_versions
///
/// [Owner or Admin] Version history of a message.
#[utoipa::path(
    get,
    path = "/v1/emails/{id}/versions",
    params(("id" = String, Path, description = "Email ID"), PageQuery),
    responses((status = 200, description = "Versions", body = [Email])),
    security(("bearer" = []))
)]
pub async fn read_email_versions(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Email>>, ApiError> {
    let id = parse_id(&id)?;
    let page = page_request(&state.config, &query, false)?;
    let latest = state.store.emails.read_latest(&id).await?;
    identity.ensure_owner_or_admin(&latest.user_id)?;
    Ok(Json(state.store.emails.read_versions(&id, &page).await?))
}

/// read_email_version
///
/// [Owner or Admin] One historical version.
#[utoipa::path(
    get,
    path = "/v1/emails/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Email ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Version", body = Email),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_email_version(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Email>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    let latest = state.store.emails.read_latest(&id).await?;
    identity.ensure_owner_or_admin(&latest.user_id)?;
    Ok(Json(state.store.emails.read_version(&id, &version_id).await?))
}

/// delete_email_version
///
/// [Admin] Deletes one historical version.
#[utoipa::path(
    delete,
    path = "/v1/emails/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Email ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = Email),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 409, description = "Current Version", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_email_version(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Email>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    Ok(Json(
        state.store.emails.delete_version(&id, &version_id).await?,
    ))
}

/// email_statuses
///
/// [Public] The delivery states of a message.
#[utoipa::path(
    get,
    path = "/v1/email_statuses",
    responses((status = 200, description = "Statuses", body = [EmailStatus]))
)]
pub async fn email_statuses() -> Json<Vec<EmailStatus>> {
    Json(EmailStatus::ALL.to_vec())
}
