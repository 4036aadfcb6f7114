use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{
    Selection, created, date_filter, list_entities, page_request, parse_id, parse_version_id,
    reconcile_id,
};
use crate::{
    AppState,
    auth::{AdminUser, Caller},
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ErrorEnvelope},
    models::{Device, Scrub},
    pagination::PageQuery,
};

/// DeviceFilter
///
/// Filters for GET /v1/devices.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeviceFilter {
    /// User ID.
    pub user: Option<String>,
    pub date: Option<String>,
}

/// The first address in `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim);
    let real = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    forwarded
        .or(real)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn expiry(state: &AppState) -> Result<chrono::DateTime<Utc>, ApiError> {
    let ttl = Duration::from_std(state.config.device_ttl)
        .map_err(|e| ApiError::Internal(format!("device ttl out of range: {e}")))?;
    Ok(Utc::now() + ttl)
}

/// Devices belong to the caller that registers them; only admins may say otherwise.
fn prepare_new(
    state: &AppState,
    caller: &Caller,
    headers: &HeaderMap,
    mut device: Device,
) -> Result<Device, ApiError> {
    if !caller.is_admin() {
        device.user_id = caller.user_id().map(str::to_string);
    }
    if let Some(ip) = client_ip(headers) {
        device.client_ip = ip;
    }
    device.expires_at = expiry(state)?;
    Ok(device)
}

fn present(device: Device, caller: &Caller) -> Device {
    let owner = caller
        .user_id()
        .is_some_and(|user_id| device.owned_by(user_id));
    if caller.is_admin() || owner {
        device
    } else {
        device.scrub()
    }
}

/// create_device
///
/// [Anyone] Registers a device. The device expires after the configured TTL.
#[utoipa::path(
    post,
    path = "/v1/devices",
    request_body = Device,
    responses(
        (status = 201, description = "Created", body = Device),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    )
)]
pub async fn create_device(
    caller: Caller,
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(device): ApiJson<Device>,
) -> Result<Response, ApiError> {
    let device = prepare_new(&state, &caller, &headers, device)?;
    let device = state.store.devices.create(device).await?;
    let id = device.id.clone();
    Ok(created("devices", &id, present(device, &caller)))
}

/// list_devices
///
/// [Admin] Lists devices by user or date.
#[utoipa::path(
    get,
    path = "/v1/devices",
    params(PageQuery, DeviceFilter),
    responses((status = 200, description = "Devices", body = [Device])),
    security(("bearer" = []))
)]
pub async fn list_devices(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<DeviceFilter>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let page = page_request(&state.config, &query, false)?;
    let date = date_filter(filter.date.as_deref())?;
    let selection = Selection::from_filters(&[
        ("user", filter.user.as_deref()),
        ("date", date.as_deref()),
    ]);
    Ok(Json(
        list_entities(&state.store.devices, &selection, &page).await?,
    ))
}

/// read_device
///
/// [Anyone] Returns a device; `clientIP` is hidden unless the caller owns it or is an admin.
#[utoipa::path(
    get,
    path = "/v1/devices/{id}",
    params(("id" = String, Path, description = "Device ID")),
    responses(
        (status = 200, description = "Device", body = Device),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    )
)]
pub async fn read_device(
    caller: Caller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Device>, ApiError> {
    let id = parse_id(&id)?;
    let device = state.store.devices.read(&id).await?;
    Ok(Json(present(device, &caller)))
}

/// device_exists
///
/// [Anyone] 204 if the device exists and has not expired.
#[utoipa::path(
    head,
    path = "/v1/devices/{id}",
    params(("id" = String, Path, description = "Device ID")),
    responses((status = 204, description = "Exists"), (status = 404, description = "Not Found"))
)]
pub async fn device_exists(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if state.store.devices.exists(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("device", &id))
    }
}

/// update_device
///
/// [Anyone] Replaces a device and refreshes its expiry. Non-admins cannot
/// change its user or client IP. If the device has expired, it is registered
/// again under a new ID (201 with `Location`).
#[utoipa::path(
    put,
    path = "/v1/devices/{id}",
    params(("id" = String, Path, description = "Device ID")),
    request_body = Device,
    responses(
        (status = 200, description = "Updated", body = Device),
        (status = 201, description = "Expired device registered again", body = Device),
        (status = 400, description = "Bad Request", body = ErrorEnvelope),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    )
)]
pub async fn update_device(
    caller: Caller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(mut device): ApiJson<Device>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    reconcile_id(&id, &mut device.id)?;

    let Some(prior) = state.store.devices.read_optional(&id).await? else {
        tracing::debug!(device_id = %id, "device expired or missing, registering again");
        let device = prepare_new(&state, &caller, &headers, device)?;
        let device = state.store.devices.create(device).await?;
        let new_id = device.id.clone();
        return Ok(created("devices", &new_id, present(device, &caller)));
    };

    if !caller.is_admin() {
        device = device.restore_scrubbed(&prior);
        if let Some(ip) = client_ip(&headers) {
            device.client_ip = ip;
        }
    }
    device.expires_at = expiry(&state)?;

    let device = state.store.devices.update(device).await?;
    Ok(Json(present(device, &caller)).into_response())
}

/// delete_device
///
/// [Admin] Deletes a device.
#[utoipa::path(
    delete,
    path = "/v1/devices/{id}",
    params(("id" = String, Path, description = "Device ID")),
    responses(
        (status = 200, description = "Deleted", body = Device),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_device(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Device>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.devices.delete(&id).await?))
}

/// read_device_versions
///
/// [Admin] Version history of a device.
#[utoipa::path(
    get,
    path = "/v1/devices/{id}/versions",
    params(("id" = String, Path, description = "Device ID"), PageQuery),
    responses((status = 200, description = "Versions", body = [Device])),
    security(("bearer" = []))
)]
pub async fn read_device_versions(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let id = parse_id(&id)?;
    let page = page_request(&state.config, &query, false)?;
    Ok(Json(state.store.devices.read_versions(&id, &page).await?))
}

/// read_device_version
///
/// [Admin] One historical version.
#[utoipa::path(
    get,
    path = "/v1/devices/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Device ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Version", body = Device),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_device_version(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Device>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    Ok(Json(state.store.devices.read_version(&id, &version_id).await?))
}

/// delete_device_version
///
/// [Admin] Deletes one historical version.
#[utoipa::path(
    delete,
    path = "/v1/devices/{id}/versions/{versionid}",
    params(
        ("id" = String, Path, description = "Device ID"),
        ("versionid" = String, Path, description = "Version ID")
    ),
    responses(
        (status = 200, description = "Deleted", body = Device),
        (status = 404, description = "Not Found", body = ErrorEnvelope),
        (status = 409, description = "Current Version", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_device_version(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiPath((id, version_id)): ApiPath<(String, String)>,
) -> Result<Json<Device>, ApiError> {
    let id = parse_id(&id)?;
    let version_id = parse_version_id(&version_id)?;
    Ok(Json(
        state.store.devices.delete_version(&id, &version_id).await?,
    ))
}
