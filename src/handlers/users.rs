use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{
    Selection, created, date_filter, list_entities, list_sorted, page_request, parse_id,
    parse_version_id, query_flag, reconcile_id,
};
use crate::{
    AppState,
    audit::CascadeWarnings,
    auth::{AdminUser, AuthUser, Identity},
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ErrorEnvelope},
    models::{Scrub, User, UserStatus},
    pagination::{PageQuery, PageRequest},
    table::TableError,
};

/// UserFilter
///
/// Secondary-index filters for GET /v1/users. The first one present applies.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub email: Option<String>,
    /// Organization ID.
    pub org: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    /// Creation date, YYYY-MM-DD.
    pub date: Option<String>,
    /// Order by email instead of by ID.
    pub sorted: Option<String>,
}

/// Users may act on their own record; admins on any.
fn ensure_self_or_admin(identity: &Identity, id: &str) -> Result<(), ApiError> {
    identity.ensure_owner_or_admin(id)
}

async fn ensure_email_available(
    state: &AppState,
    email: &str,
    except_id: Option<&str>,
) -> Result<(), ApiError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Ok(());
    }
    match state.store.users.find_by_index("email", &email).await? {
        Some(existing) if Some(existing.id.as_str()) != except_id => Err(ApiError::Conflict(
            format!("email {email} is already in use"),
        )),
        _ => Ok(()),
    }
}

/// create_user
///
/// [Admin] Creates a user. Email addresses are unique.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = User,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 401, description = "Unauthenticated", body = ErrorEnvelope),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 409, description = "Conflict", body = ErrorEnvelope),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn create_user(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(user): ApiJson<User>,
) -> Result<Response, ApiError> {
    ensure_email_available(&state, &user.email, None).await?;
    let user = state.store.users.create(user).await?;
    tracing::info!(user_id = %user.id, "user created");
    Ok(created("users", &user.id, user.clone()))
}

/// list_users
///
/// [Admin] Lists users, optionally through one secondary index.
#[utoipa::path(
    get,
    path = "/v1/users",
    params(PageQuery, UserFilter),
    responses((status = 200, description = "Users", body = [User])),
    security(("bearer" = []))
)]
pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> Result<Json<Vec<User>>, ApiError> {
    let page = page_request(&state.config, &query, false)?;
    let sorted = query_flag("sorted", filter.sorted.as_deref())?;
    let date = date_filter(filter.date.as_deref())?;
    let email = filter.email.as_deref().map(|e| e.trim().to_lowercase());
    let status = filter.status.as_deref().map(str::to_uppercase);

    let selection = Selection::from_filters(&[
        ("email", email.as_deref()),
        ("org", filter.org.as_deref()),
        ("role", filter.role.as_deref()),
        ("status", status.as_deref()),
        ("date", date.as_deref()),
    ]);

    let users = if sorted {
        list_sorted(&state.store.users, &selection, &page, |u: &User| u.email.clone()).await?
    } else {
        list_entities(&state.store.users, &selection, &page).await?
    };
    Ok(Json(users))
}

/// read_user
///
/// [Self or Admin] Returns the current version of a user.
#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 400, description = "Bad Request", body = ErrorEnvelope),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_user(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    ensure_self_or_admin(&identity, &id)?;
    Ok(Json(state.store.users.read(&id).await?))
}

/// user_exists
///
/// [Self or Admin] 204 if the user exists.
#[utoipa::path(
    head,
    path = "/v1/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses((status = 204, description = "Exists"), (status = 404, description = "Not Found")),
    security(("bearer" = []))
)]
pub async fn user_exists(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    ensure_self_or_admin(&identity, &id)?;
    if state.store.users.exists(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("user", &id))
    }
}

/// update_user
///
/// [Self or Admin] Whole-document replacement. For non-admins, roles, status,
/// organization and notes are carried over from the stored version.
#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    request_body = User,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Bad Request", body = ErrorEnvelope),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn update_user(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(mut user): ApiJson<User>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    reconcile_id(&id, &mut user.id)?;
    ensure_self_or_admin(&identity, &id)?;

    let prior = state.store.users.read(&id).await?;
    if !identity.is_admin() {
        user = user.restore_scrubbed(&prior);
    }
    ensure_email_available(&state, &user.email, Some(&id)).await?;

    Ok(Json(state.store.users.update(user).await?))
}

/// delete_user
///
/// [Admin] Deletes a user and, best effort, every token issued to it.
#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = User),
        (status = 400, description = "Bad Request", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_user(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let user = state.store.users.delete(&id).await?;
    let warnings = delete_user_tokens(&state, &id).await;
    Ok((Extension(CascadeWarnings(warnings)), Json(user)).into_response())
}

/// Deletes every token of a user, collecting failures instead of stopping at them.
async fn delete_user_tokens(state: &AppState, user_id: &str) -> Vec<String> {
    let tokens = &state.store.tokens;
    let token_ids = match tokens
        .read_ids_by_index("user", user_id, &PageRequest::unbounded())
        .await
    {
        Ok(ids) => ids,
        Err(e) => return vec![format!("listing tokens of user {user_id}: {e}")],
    };

    let mut warnings = Vec::new();
    for token_id in token_ids {
        match tokens.delete(&token_id).await {
            // Expired in the meantime.
            Ok(_) | Err(TableError::NotFound { .. }) => {}
            Err(e) => warnings.push(format!("deleting token {token_id}: {e}")),
        }
    }
    warnings
}

/// read_user_versions
///
/// [Self or Admin] Pages through the version history of a user.
#[utoipa::path(
    get,
    path = "/v1/users/{id}/versions",
    params(("id" = String, Path, description = "User ID"), PageQuery),
    responses((status = 200, description = "Versions", body = [User])),
    security(("bearer" = []))
)]
pub async fn read_user_versions(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let id = parse_id(&id)?;
    ensure_self_or_admin(&identity, &id)?;
    let page = page_request(&state.config, &query, false)?;
    Ok(Json(state.store.users.read_versions(&id, &page).await?))
}

/// read_user_version
///
/// [Self or Admin] Returns one historical version.
#[utoipa::path(
    get,
    path = "/v1/users/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "User ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Version", body = User),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_user_version(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    ensure_self_or_admin(&identity, &id)?;
    Ok(Json(state.store.users.read_version(&id, &version_id).await?))
}

/// delete_user_version
///
/// [Admin] Deletes one historical version. The current version cannot be deleted (409).
#[utoipa::path(
    delete,
    path = "/v1/users/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "User ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = User),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 409, description = "Conflict", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_user_version(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    Ok(Json(state.store.users.delete_version(&id, &version_id).await?))
}

/// user_statuses
///
/// [Public] The user lifecycle states.
#[utoipa::path(
    get,
    path = "/v1/user_statuses",
    responses((status = 200, description = "Statuses", body = [UserStatus]))
)]
pub async fn user_statuses() -> Json<Vec<UserStatus>> {
    Json(UserStatus::ALL.to_vec())
}

/// user_roles
///
/// [Authenticated] Every role currently assigned to at least one user.
#[utoipa::path(
    get,
    path = "/v1/user_roles",
    responses((status = 200, description = "Roles", body = [String])),
    security(("bearer" = []))
)]
pub async fn user_roles(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.users.read_index_values("role").await?))
}
