use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{pagination::PageError, storage::StorageError};

/// Message used for every 500 response. The underlying detail is only written to
/// the audit event and the log, never to the client.
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// LogLevel
///
/// Severity attached to error envelopes and audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ApiError
///
/// The HTTP-facing error taxonomy. Every handler, extractor and middleware
/// returns this type, so every failure leaves the service in the same envelope.
///
/// When converted into a response, a clone of the error rides along in the
/// response extensions; the audit middleware picks it up to fill in the request
/// URI and, for `Internal`, to persist an audit event and embed its ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Malformed JSON, or invalid path/query parameter syntax (400).
    #[error("{0}")]
    BadRequest(String),

    /// Missing or unresolvable credentials (401).
    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated, but lacking the role or ownership required (403).
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// The request conflicts with the stored state (409).
    #[error("{0}")]
    Conflict(String),

    /// Domain validation failed; carries every problem found (422).
    #[error("validation failed: {}", .0.join("; "))]
    Unprocessable(Vec<String>),

    /// The handler did not finish within the configured request timeout (408).
    #[error("request timed out")]
    Timeout,

    /// A bare status produced outside the handlers, such as axum's 405 for an
    /// unsupported method. Carried so it still leaves in the envelope.
    #[error("{}", .0.canonical_reason().unwrap_or("request failed"))]
    Status(StatusCode),

    /// Unexpected store or dependency failure (500). The detail is internal only.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated("unauthenticated".to_string())
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized("unauthorized".to_string())
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::NotFound(format!("{what} {id} not found"))
    }

    /// from_status
    ///
    /// Wraps an error status that reached the audit trail without an `ApiError`.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::REQUEST_TIMEOUT => Self::Timeout,
            status if status.is_server_error() => Self::Internal(format!(
                "{status} returned without an error body"
            )),
            status => Self::Status(status),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Status(status) => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Internal(_) => LogLevel::Error,
            Self::Unauthenticated(_) | Self::Unauthorized(_) | Self::Timeout => LogLevel::Warn,
            _ => LogLevel::Info,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// The message that is safe to show to API clients.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "internal server error");
        }

        let envelope = ErrorEnvelope::from_error(&self, String::new());
        let mut response = (self.status(), Json(envelope)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("malformed JSON: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("invalid query string: {}", rejection.body_text()))
    }
}

/// ErrorEnvelope
///
/// The uniform JSON body of every error response. `code` always mirrors the
/// HTTP status; `eventID` is present only when the error was persisted as an
/// audit event (internal errors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ErrorEnvelope {
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub log_level: LogLevel,
    pub code: u16,
    pub message: String,
    pub uri: String,
}

impl ErrorEnvelope {
    pub fn from_error(error: &ApiError, uri: String) -> Self {
        Self {
            event_id: None,
            created_at: Utc::now(),
            log_level: error.log_level(),
            code: error.status().as_u16(),
            message: error.client_message(),
            uri,
        }
    }
}

/// ApiJson
///
/// JSON body extractor whose rejection is an `ApiError` (400 in the envelope)
/// instead of axum's plain-text rejection.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// ApiQuery
///
/// Query string extractor with an `ApiError` rejection.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// ApiPath
///
/// Path parameter extractor with an `ApiError` rejection, so undecodable
/// segments (bad percent-encoding, invalid UTF-8) get the envelope too.
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_statuses_map_to_envelope_errors() {
        assert_eq!(
            ApiError::from_status(StatusCode::REQUEST_TIMEOUT),
            ApiError::Timeout
        );
        assert_eq!(
            ApiError::from_status(StatusCode::METHOD_NOT_ALLOWED).to_string(),
            "Method Not Allowed"
        );
        assert!(ApiError::from_status(StatusCode::BAD_GATEWAY).is_internal());
        assert_eq!(
            ApiError::from_status(StatusCode::PAYLOAD_TOO_LARGE).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn envelope_code_mirrors_status() {
        let envelope = ErrorEnvelope::from_error(&ApiError::Timeout, "/v1/users".to_string());
        assert_eq!(envelope.code, 408);
        assert_eq!(envelope.message, "request timed out");
        assert_eq!(envelope.log_level, LogLevel::Warn);
    }
}
