use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    AppState, Store,
    error::ApiError,
    models::{ADMIN_ROLE, Scrub, Token, User, UserStatus},
    table::TableError,
    tuid,
};

/// AuthFailure
///
/// Why a well-formed bearer token did not resolve to an identity.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("unknown or expired token")]
    UnknownToken,

    #[error("token references missing user {0}")]
    UnknownUser(String),

    #[error("user {id} is {}", .status.as_str())]
    UserNotEnabled { id: String, status: UserStatus },

    #[error(transparent)]
    Store(#[from] TableError),
}

/// Identity
///
/// The resolved caller of an authenticated request: the presented token and the
/// (scrubbed) user it belongs to. Inserted into request extensions by
/// `authenticate` and read back by the `Caller`, `AuthUser` and `AdminUser` extractors.
#[derive(Debug, Clone)]
pub struct Identity {
    pub token: Token,
    pub user: User,
}

impl Identity {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.has_role(ADMIN_ROLE)
    }

    /// Admin satisfies every role.
    pub fn has_role(&self, role: &str) -> bool {
        self.is_admin() || self.user.has_role(role)
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        !owner_id.is_empty() && self.user.id == owner_id
    }

    /// Ownership rule: admins may touch any instance, everyone else only their own.
    pub fn ensure_owner_or_admin(&self, owner_id: &str) -> Result<(), ApiError> {
        if self.is_admin() || self.owns(owner_id) {
            Ok(())
        } else {
            Err(ApiError::unauthorized())
        }
    }
}

/// bearer_token
///
/// Extracts `<token>` from `Authorization: Bearer <token>`. Anything else
/// (missing header, other scheme, empty or multi-part token) is `None`, and the
/// request is treated as anonymous.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}

/// resolve_identity
///
/// Looks the token up, then its user. Expired tokens read as missing. Only
/// `ENABLED` users authenticate.
pub async fn resolve_identity(store: &Store, bearer: &str) -> Result<Identity, AuthFailure> {
    if !tuid::is_valid(bearer) {
        return Err(AuthFailure::UnknownToken);
    }

    let token = store
        .tokens
        .read_optional(bearer)
        .await?
        .ok_or(AuthFailure::UnknownToken)?;

    let user = store
        .users
        .read_optional(&token.user_id)
        .await?
        .ok_or_else(|| AuthFailure::UnknownUser(token.user_id.clone()))?;

    if !user.is_enabled() {
        return Err(AuthFailure::UserNotEnabled {
            id: user.id,
            status: user.status,
        });
    }

    Ok(Identity {
        token,
        user: user.scrub(),
    })
}

/// authenticate
///
/// Bearer authentication middleware, applied to every route.
///
/// 1. No usable `Authorization` header: continue anonymously.
/// 2. Token resolves: attach the `Identity` to the request (and to the response,
///    for the audit trail).
/// 3. Token does not resolve: with `strict_bearer_validation` the request is
///    rejected with 401, otherwise it continues anonymously.
///
/// Store failures during resolution are internal errors in both modes.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(bearer) = bearer_token(request.headers()).map(str::to_string) else {
        return next.run(request).await;
    };

    match resolve_identity(&state.store, &bearer).await {
        Ok(identity) => {
            tracing::debug!(user_id = %identity.user.id, "bearer token resolved");
            request.extensions_mut().insert(identity.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(identity);
            response
        }
        Err(AuthFailure::Store(e)) => ApiError::from(e).into_response(),
        Err(failure) if state.config.strict_bearer_validation => {
            tracing::warn!(reason = %failure, "rejecting unresolvable bearer token");
            ApiError::unauthenticated().into_response()
        }
        Err(failure) => {
            tracing::debug!(reason = %failure, "continuing anonymously");
            next.run(request).await
        }
    }
}

/// require_role
///
/// Router-level role guard: 401 without an identity, 403 without the role.
/// Mount with `middleware::from_fn(|req, next| require_role("admin", req, next))`.
pub async fn require_role(role: &'static str, request: Request, next: Next) -> Response {
    let allowed = match request.extensions().get::<Identity>() {
        None => return ApiError::unauthenticated().into_response(),
        Some(identity) if identity.has_role(role) => true,
        Some(identity) => {
            tracing::debug!(user_id = %identity.user.id, role, "role check failed");
            false
        }
    };
    if allowed {
        next.run(request).await
    } else {
        ApiError::unauthorized().into_response()
    }
}

/// Caller
///
/// The optional identity of the request. Never rejects.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(Identity::is_admin)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(Identity::user_id)
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<Identity>().cloned()))
    }
}

/// AuthUser
///
/// Handler extractor requiring an authenticated caller (401 otherwise).
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(ApiError::unauthenticated)
    }
}

/// AdminUser
///
/// Handler extractor requiring the `admin` role: 401 when anonymous, 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        if identity.is_admin() {
            Ok(AdminUser(identity))
        } else {
            Err(ApiError::unauthorized())
        }
    }
}
