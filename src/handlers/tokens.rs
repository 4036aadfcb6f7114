use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{Selection, created, list_entities, page_request, parse_id};
use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ErrorEnvelope},
    models::{CreateTokenRequest, Token},
    pagination::PageQuery,
    tuid,
};

/// TokenFilter
///
/// Filters for GET /v1/tokens.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenFilter {
    /// User ID the token authenticates as.
    pub user: Option<String>,
}

/// create_token
///
/// [Admin] Provisions a bearer token for an existing user. The token's `id`
/// is the credential.
#[utoipa::path(
    post,
    path = "/v1/tokens",
    request_body = CreateTokenRequest,
    responses(
        (status = 201, description = "Created", body = Token),
        (status = 422, description = "Validation Failed", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn create_token(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTokenRequest>,
) -> Result<Response, ApiError> {
    let mut problems = Vec::new();
    let ttl = match request.ttl_seconds {
        Some(0) => None,
        Some(secs) => i64::try_from(secs).ok().and_then(Duration::try_seconds),
        None => Duration::from_std(state.config.token_ttl).ok(),
    };
    let expires_at = ttl.and_then(|ttl| Utc::now().checked_add_signed(ttl));
    if expires_at.is_none() {
        problems.push("ttlSeconds must be a positive number of seconds".to_string());
    }

    if tuid::is_valid(&request.user_id) {
        if !state.store.users.exists(&request.user_id).await? {
            problems.push(format!("userID {} does not exist", request.user_id));
        }
    } else {
        problems.push("userID must be a valid TUID".to_string());
    }

    let Some(expires_at) = expires_at.filter(|_| problems.is_empty()) else {
        return Err(ApiError::Unprocessable(problems));
    };

    let token = state
        .store
        .tokens
        .create(Token {
            user_id: request.user_id,
            expires_at,
            ..Token::default()
        })
        .await?;
    tracing::info!(user_id = %token.user_id, "token issued");
    Ok(created("tokens", &token.id, token.clone()))
}

/// list_tokens
///
/// [Admin] Lists live tokens, optionally for one user.
#[utoipa::path(
    get,
    path = "/v1/tokens",
    params(PageQuery, TokenFilter),
    responses((status = 200, description = "Tokens", body = [Token])),
    security(("bearer" = []))
)]
pub async fn list_tokens(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<TokenFilter>,
) -> Result<Json<Vec<Token>>, ApiError> {
    let page = page_request(&state.config, &query, false)?;
    let selection = Selection::from_filters(&[("user", filter.user.as_deref())]);
    Ok(Json(
        list_entities(&state.store.tokens, &selection, &page).await?,
    ))
}

/// read_token
///
/// [Owner or Admin] Returns a token.
#[utoipa::path(
    get,
    path = "/v1/tokens/{id}",
    params(("id" = String, Path, description = "Token ID")),
    responses(
        (status = 200, description = "Token", body = Token),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn read_token(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Token>, ApiError> {
    let id = parse_id(&id)?;
    let token = state.store.tokens.read(&id).await?;
    identity.ensure_owner_or_admin(&token.user_id)?;
    Ok(Json(token))
}

/// token_exists
///
/// [Owner or Admin] 204 if the token exists and has not expired.
#[utoipa::path(
    head,
    path = "/v1/tokens/{id}",
    params(("id" = String, Path, description = "Token ID")),
    responses((status = 204, description = "Exists"), (status = 404, description = "Not Found")),
    security(("bearer" = []))
)]
pub async fn token_exists(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let token = state.store.tokens.read(&id).await?;
    identity.ensure_owner_or_admin(&token.user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// delete_token
///
/// [Owner or Admin] Revokes a token. Deleting the token in use logs the caller out.
#[utoipa::path(
    delete,
    path = "/v1/tokens/{id}",
    params(("id" = String, Path, description = "Token ID")),
    responses(
        (status = 200, description = "Deleted", body = Token),
        (status = 403, description = "Unauthorized", body = ErrorEnvelope),
        (status = 404, description = "Not Found", body = ErrorEnvelope)
    ),
    security(("bearer" = []))
)]
pub async fn delete_token(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Token>, ApiError> {
    let id = parse_id(&id)?;
    let token = state.store.tokens.read(&id).await?;
    identity.ensure_owner_or_admin(&token.user_id)?;
    Ok(Json(state.store.tokens.delete(&id).await?))
}
