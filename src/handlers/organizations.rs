use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

use super::{
    Selection, created, date_filter, list_entities, list_sorted, page_request, parse_id,
    parse_version_id, query_flag, reconcile_id,
};
use crate::{
    AppState,
    auth::{AdminUser, AuthUser, Identity},
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ErrorEnvelope},
    models::{Organization, OrganizationStatus, Scrub, User},
    pagination::PageQuery,
};

/// OrganizationFilter
///
/// Filters for GET /v1/organizations. `search` matches name terms and takes
/// precedence over the index filters.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrganizationFilter {
    pub status: Option<String>,
    pub date: Option<String>,
    /// Space separated name terms.
    pub search: Option<String>,
    /// Match any search term instead of all of them.
    pub any: Option<String>,
    /// Order by name instead of by ID.
    pub sorted: Option<String>,
}

/// How much of an organization the caller may see.
enum Visibility {
    Full,
    Scrubbed,
}

/// Admins see everything; members see their own organization scrubbed.
fn visibility(identity: &Identity, org_id: &str) -> Result<Visibility, ApiError> {
    if identity.is_admin() {
        Ok(Visibility::Full)
    } else if identity.user.org_id == org_id {
        Ok(Visibility::Scrubbed)
    } else {
        Err(ApiError::unauthorized())
    }
}

fn present(org: Organization, visibility: &Visibility) -> Organization {
    match visibility {
        Visibility::Full => org,
        Visibility::Scrubbed => org.scrub(),
    }
}

/// create_organization
///
/// [Admin] Creates an organization.
#[utoipa::path(
    post,
    path = "/v1/organizations",
    request_body = Organization,
    responses(
        (status = 201, description = "Created", body = Organization),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn create_organization(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(org): ApiJson<Organization>,
) -> Result<Response, ApiError> {
    let org = state.store.organizations.create(org).await?;
    Ok(created("organizations", &org.id, org.clone()))
}

/// list_organizations
///
/// [Admin] Lists organizations by status, date or name search.
#[utoipa::path(
    get,
    path = "/v1/organizations",
    params(PageQuery, OrganizationFilter),
    responses((status = 200, description = "Organizations", body = [Organization])),
    security(("bearer" = []))
)]
pub async fn list_organizations(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<OrganizationFilter>,
) -> Result<Json<Vec<Organization>>, ApiError> {
    let page = page_request(&state.config, &query, false)?;
    let sorted = query_flag("sorted", filter.sorted.as_deref())?;
    let any = query_flag("any", filter.any.as_deref())?;
    let date = date_filter(filter.date.as_deref())?;
    let status = filter.status.as_deref().map(str::to_uppercase);

    let selection = Selection::from_filters(&[
        ("status", status.as_deref()),
        ("date", date.as_deref()),
    ])
    .with_search(filter.search.as_deref(), any);

    let orgs = if sorted {
        list_sorted(&state.store.organizations, &selection, &page, |o: &Organization| {
            o.name.to_lowercase()
        })
        .await?
    } else {
        list_entities(&state.store.organizations, &selection, &page).await?
    };
    Ok(Json(orgs))
}

/// read_organization
///
/// [Member or Admin] Members receive the organization without its notes.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}",
    params(("id" = String, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_organization(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Organization>, ApiError> {
    let id = parse_id(&id)?;
    let visibility = visibility(&identity, &id)?;
    let org = state.store.organizations.read(&id).await?;
    Ok(Json(present(org, &visibility)))
}

/// organization_exists
///
/// [Member or Admin] 204 if the organization exists.
#[utoipa::path(
    head,
    path = "/v1/organizations/{id}",
    params(("id" = String, Path, description = "Organization ID")),
    responses((status = 204, description = "Exists"), (status = 404, description = "Not Found")),
    security(("bearer" = []))
)]
pub async fn organization_exists(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    visibility(&identity, &id)?;
    if state.store.organizations.exists(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("organization", &id))
    }
}

/// update_organization
///
/// [Admin] Whole-document replacement.
#[utoipa::path(
    put,
    path = "/v1/organizations/{id}",
    params(("id" = String, Path, description = "Organization ID")),
    request_body = Organization,
    responses(
        (status = 200, description = "Updated", body = Organization),
        (status = 400, description = "Bad Request", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn update_organization(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(mut org): ApiJson<Organization>,
) -> Result<Json<Organization>, ApiError> {
    let id = parse_id(&id)?;
    reconcile_id(&id, &mut org.id)?;
    Ok(Json(state.store.organizations.update(org).await?))
}

/// delete_organization
///
/// [Admin] Deletes an organization. Member users keep their (now dangling) `orgID`.
#[utoipa::path(
    delete,
    path = "/v1/organizations/{id}",
    params(("id" = String, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Deleted", body = Organization),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_organization(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Organization>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.organizations.delete(&id).await?))
}

/// read_organization_versions
///
/// [Member or Admin] Version history, scrubbed for members.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/versions",
    params(("id" = String, Path, description = "Organization ID"), PageQuery),
    responses((status = 200, description = "Versions", body = [Organization])),
    security(("bearer" = []))
)]
pub async fn read_organization_versions(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Organization>>, ApiError> {
    let id = parse_id(&id)?;
    let visibility = visibility(&identity, &id)?;
    let page = page_request(&state.config, &query, false)?;
    let versions = state.store.organizations.read_versions(&id, &page).await?;
    Ok(Json(
        versions
            .into_iter()
            .map(|org| present(org, &visibility))
            .collect(),
    ))
}

/// read_organization_version
///
/// [Member or Admin] One historical version.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Organization ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Version", body = Organization),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_organization_version(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Organization>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    let visibility = visibility(&identity, &id)?;
    let org = state.store.organizations.read_version(&id, &version_id).await?;
    Ok(Json(present(org, &visibility)))
}

/// delete_organization_version
///
/// [Admin] Deletes one historical version.
#[utoipa::path(
    delete,
    path = "/v1/organizations/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Organization ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = Organization),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 409, description = "Current Version", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_organization_version(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Organization>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    Ok(Json(
        state
            .store
            .organizations
            .delete_version(&id, &version_id)
            .await?,
    ))
}

/// list_organization_users
///
/// [Member or Admin] The users of an organization. Members see other members scrubbed.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/users",
    params(("id" = String, Path, description = "Organization ID"), PageQuery),
    responses(
        (status = 200, description = "Users", body = [User]),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn list_organization_users(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let id = parse_id(&id)?;
    let visibility = visibility(&identity, &id)?;
    let page = page_request(&state.config, &query, false)?;

    if !state.store.organizations.exists(&id).await? {
        return Err(ApiError::not_found("organization", &id));
    }

    let users = state.store.users.read_by_index("org", &id, &page).await?;
    let users = match visibility {
        Visibility::Full => users,
        Visibility::Scrubbed => users
            .into_iter()
            .map(|user| {
                if user.id == identity.user.id {
                    user
                } else {
                    user.scrub()
                }
            })
            .collect(),
    };
    Ok(Json(users))
}

/// organization_statuses
///
/// [Public] The organization lifecycle states.
#[utoipa::path(
    get,
    path = "/v1/organization_statuses",
    responses((status = 200, description = "Statuses", body = [OrganizationStatus]))
)]
pub async fn organization_statuses() -> Json<Vec<OrganizationStatus>> {
    Json(OrganizationStatus::ALL.to_vec())
}
