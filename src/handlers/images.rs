use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{
    Selection, created, date_filter, list_entities, page_request, parse_id, parse_version_id,
    query_flag, reconcile_id,
};
use crate::{
    AppState,
    audit::CascadeWarnings,
    auth::AuthUser,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ErrorEnvelope},
    models::{Image, PresignedUrl, Scrub},
    pagination::PageQuery,
    storage::PRESIGNED_URL_TTL,
};

/// ImageFilter
///
/// Filters for GET /v1/images. `search` matches title and file name terms.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImageFilter {
    /// Owner user ID.
    pub user: Option<String>,
    pub tag: Option<String>,
    pub date: Option<String>,
    pub search: Option<String>,
    /// Match any search term instead of all of them.
    pub any: Option<String>,
}

fn presigned(url: String, resource_key: String) -> PresignedUrl {
    PresignedUrl {
        url,
        resource_key,
        expires_in_secs: PRESIGNED_URL_TTL.as_secs(),
    }
}

/// create_image
///
/// [Authenticated] Registers image metadata owned by the caller. Admins may
/// register on behalf of another user by setting `ownerID`. Upload the bytes
/// afterwards through `/v1/images/{id}/upload`.
#[utoipa::path(
    post,
    path = "/v1/images",
    request_body = Image,
    responses(
        (status = 201, description = "Created", body = Image),
        (status = 401, description = "Unauthenticated", body = ErrorEnvelope),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn create_image(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiJson(mut image): ApiJson<Image>,
) -> Result<Response, ApiError> {
    if !identity.is_admin() || image.owner_id.is_empty() {
        image.owner_id = identity.user_id().to_string();
    }
    let image = state.store.images.create(image).await?;
    Ok(created("images", &image.id, image.clone()))
}

/// list_images
///
/// [Authenticated] Lists images by owner, tag, date or search terms.
#[utoipa::path(
    get,
    path = "/v1/images",
    params(PageQuery, ImageFilter),
    responses((status = 200, description = "Images", body = [Image])),
    security(("bearer" = []))
)]
pub async fn list_images(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<ImageFilter>,
) -> Result<Json<Vec<Image>>, ApiError> {
    let page = page_request(&state.config, &query, false)?;
    let any = query_flag("any", filter.any.as_deref())?;
    let date = date_filter(filter.date.as_deref())?;
    let tag = filter.tag.as_deref().map(str::to_lowercase);

    let selection = Selection::from_filters(&[
        ("user", filter.user.as_deref()),
        ("tag", tag.as_deref()),
        ("date", date.as_deref()),
    ])
    .with_search(filter.search.as_deref(), any);

    Ok(Json(
        list_entities(&state.store.images, &selection, &page).await?,
    ))
}

/// read_image
///
/// [Authenticated] Returns image metadata.
#[utoipa::path(
    get,
    path = "/v1/images/{id}",
    params(("id" = String, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image", body = Image),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_image(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Image>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.images.read(&id).await?))
}

/// image_exists
///
/// [Authenticated] 204 if the image exists.
#[utoipa::path(
    head,
    path = "/v1/images/{id}",
    params(("id" = String, Path, description = "Image ID")),
    responses((status = 204, description = "Exists"), (status = 404, description = "Not Found")),
    security(("bearer" = []))
)]
pub async fn image_exists(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.store.images.exists(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("image", &id))
    }
}

/// update_image
///
/// [Owner or Admin] Replaces image metadata. Only an admin may move `ownerID`,
/// and the file name cannot change because it addresses the stored bytes.
#[utoipa::path(
    put,
    path = "/v1/images/{id}",
    params(("id" = String, Path, description = "Image ID")),
    request_body = Image,
    responses(
        (status = 200, description = "Updated", body = Image),
        (status = 400, description = "Bad Request", body = ErrorEnvelope),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn update_image(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(mut image): ApiJson<Image>,
) -> Result<Json<Image>, ApiError> {
    let id = parse_id(&id)?;
    reconcile_id(&id, &mut image.id)?;

    let prior = state.store.images.read(&id).await?;
    identity.ensure_owner_or_admin(&prior.owner_id)?;
    if !identity.is_admin() {
        image = image.restore_scrubbed(&prior);
    }
    if image.file_name != prior.file_name {
        return Err(ApiError::Unprocessable(vec![
            "fileName cannot change; create a new image instead".to_string(),
        ]));
    }

    Ok(Json(state.store.images.update(image).await?))
}

/// delete_image
///
/// [Owner or Admin] Deletes image metadata and, best effort, the stored bytes.
#[utoipa::path(
    delete,
    path = "/v1/images/{id}",
    params(("id" = String, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Deleted", body = Image),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_image(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let prior = state.store.images.read(&id).await?;
    identity.ensure_owner_or_admin(&prior.owner_id)?;

    let image = state.store.images.delete(&id).await?;
    let mut warnings = Vec::new();
    if let Err(e) = state.storage.delete_object(&image.object_key()).await {
        warnings.push(format!("deleting stored object of image {id}: {e}"));
    }
    Ok((Extension(CascadeWarnings(warnings)), Json(image)).into_response())
}

/// read_image_versions
///
/// [Owner or Admin] Version history of an image. Access follows the current
/// owner, so an admin transfer of `ownerID` also moves the history.
#[utoipa::path(
    get,
    path = "/v1/images/{id}/versions",
    params(("id" = String, Path, description = "Image ID"), PageQuery),
    responses((status = 200, description = "Versions", body = [Image])),
    security(("bearer" = []))
)]
pub async fn read_image_versions(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Image>>, ApiError> {
    let id = parse_id(&id)?;
    let page = page_request(&state.config, &query, false)?;
    let latest = state.store.images.read_latest(&id).await?;
    identity.ensure_owner_or_admin(&latest.owner_id)?;
    Ok(Json(state.store.images.read_versions(&id, &page).await?))
}

/// read_image_version
///
/// [Owner or Admin] One historical version.
#[utoipa::path(
    get,
    path = "/v1/images/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Image ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Version", body = Image),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_image_version(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Image>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    let latest = state.store.images.read_latest(&id).await?;
    identity.ensure_owner_or_admin(&latest.owner_id)?;
    Ok(Json(state.store.images.read_version(&id, &version_id).await?))
}

/// delete_image_version
///
/// [Owner or Admin] Deletes one historical version.
#[utoipa::path(
    delete,
    path = "/v1/images/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Image ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = Image),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 409, description = "Current Version", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_image_version(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Image>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    let latest = state.store.images.read_latest(&id).await?;
    identity.ensure_owner_or_admin(&latest.owner_id)?;
    Ok(Json(
        state.store.images.delete_version(&id, &version_id).await?,
    ))
}

/// upload_image
///
/// [Owner or Admin] Returns a presigned PUT URL for the image bytes. The upload
/// must send the image's `contentType`.
#[utoipa::path(
    post,
    path = "/v1/images/{id}/upload",
    params(("id" = String, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Presigned upload URL", body = PresignedUrl),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 500, description = "Internal Error", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn upload_image(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<PresignedUrl>, ApiError> {
    let id = parse_id(&id)?;
    let image = state.store.images.read(&id).await?;
    identity.ensure_owner_or_admin(&image.owner_id)?;

    let key = image.object_key();
    let url = state
        .storage
        .get_presigned_upload_url(&key, &image.content_type)
        .await?;
    tracing::debug!(image_id = %id, key = %key, "presigned upload issued");
    Ok(Json(presigned(url, key)))
}

/// download_image
///
/// [Authenticated] Returns a presigned GET URL for the image bytes.
#[utoipa::path(
    get,
    path = "/v1/images/{id}/download",
    params(("id" = String, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Presigned download URL", body = PresignedUrl),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 500, description = "Internal Error", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn download_image(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<PresignedUrl>, ApiError> {
    let id = parse_id(&id)?;
    let image = state.store.images.read(&id).await?;
    let key = image.object_key();
    let url = state.storage.get_presigned_download_url(&key).await?;
    Ok(Json(presigned(url, key)))
}

/// image_tags
///
/// [Authenticated] Every tag currently used by at least one image.
#[utoipa::path(
    get,
    path = "/v1/image_tags",
    responses((status = 200, description = "Tags", body = [String])),
    security(("bearer" = []))
)]
pub async fn image_tags(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.images.read_index_values("tag").await?))
}
