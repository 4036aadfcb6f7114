use axum::Json;

use crate::{
    error::{ApiError, ApiPath, ErrorEnvelope},
    tuid::{Tuid, TuidInfo},
};

/// new_tuid
///
/// [Public] Generates a fresh TUID and returns its decoded form.
#[utoipa::path(
    get,
    path = "/v1/tuids",
    responses((status = 200, description = "New TUID", body = TuidInfo))
)]
pub async fn new_tuid() -> Json<TuidInfo> {
    Json(Tuid::new().info())
}

/// read_tuid
///
/// [Public] Decodes an existing TUID into its timestamp and entropy.
#[utoipa::path(
    get,
    path = "/v1/tuids/{id}",
    params(("id" = String, Path, description = "TUID to decode")),
    responses(
        (status = 200, description = "Decoded TUID", body = TuidInfo),
        (status = 400, description = "Not a TUID", body = ErrorEnvelope)
    )
)]
pub async fn read_tuid(ApiPath(id): ApiPath<String>) -> Result<Json<TuidInfo>, ApiError> {
    let tuid: Tuid = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid parameter, id: {e}")))?;
    Ok(Json(tuid.info()))
}
