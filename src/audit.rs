use axum::{
    Json,
    extract::{Request, State},
    http::{Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    auth::Identity,
    error::{ApiError, ErrorEnvelope, LogLevel},
    models::Event,
    table::Table,
};

/// CascadeWarnings
///
/// Attached to a response by handlers whose best-effort dependent deletes
/// partially failed. The audit trail records them as a single WARN event.
#[derive(Debug, Clone, Default)]
pub struct CascadeWarnings(pub Vec<String>);

/// Where an event happened and who caused it.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub method: String,
    pub uri: String,
    pub user_id: Option<String>,
}

/// record_event
///
/// Persists an audit event and returns its ID. Failing to record is logged and
/// swallowed; the audit trail never turns a response into a different one.
pub async fn record_event(
    events: &Table<Event>,
    context: &EventContext,
    log_level: LogLevel,
    code: u16,
    message: String,
) -> Option<String> {
    let event = Event {
        log_level,
        code,
        message,
        uri: context.uri.clone(),
        method: context.method.clone(),
        user_id: context.user_id.clone(),
        ..Event::default()
    };

    match events.create(event).await {
        Ok(event) => Some(event.id),
        Err(e) => {
            tracing::error!(error = %e, uri = %context.uri, "failed to record audit event");
            None
        }
    }
}

fn is_mutation(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

/// audit_trail
///
/// Outermost application middleware.
///
/// 1. Error responses: the `ApiError` left in the response extensions is turned
///    into the final envelope with the request URI. Error statuses raised without
///    one (timeouts, axum's 405) are wrapped first. Internal errors are persisted
///    as ERROR events and the event ID is returned to the client.
/// 2. Successful POST/PUT/DELETE: recorded as INFO events.
/// 3. Cascade warnings: recorded as one WARN event.
pub async fn audit_trail(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let context = EventContext {
        method: method.to_string(),
        uri,
        user_id: response
            .extensions()
            .get::<Identity>()
            .map(|identity| identity.user.id.clone()),
    };
    let events = &state.store.events;

    let status = response.status();
    let error = response.extensions().get::<ApiError>().cloned().or_else(|| {
        (status.is_client_error() || status.is_server_error())
            .then(|| ApiError::from_status(status))
    });

    if let Some(error) = error {
        let mut envelope = ErrorEnvelope::from_error(&error, context.uri.clone());
        if let ApiError::Internal(detail) = &error {
            envelope.event_id = record_event(
                events,
                &context,
                LogLevel::Error,
                error.status().as_u16(),
                detail.clone(),
            )
            .await;
        }

        let (parts, _) = response.into_parts();
        let mut rebuilt = (parts.status, Json(envelope)).into_response();
        // Keep headers such as `Allow` on a 405; the body headers are the envelope's.
        for (name, value) in &parts.headers {
            if *name != header::CONTENT_TYPE && *name != header::CONTENT_LENGTH {
                rebuilt.headers_mut().append(name.clone(), value.clone());
            }
        }
        *rebuilt.extensions_mut() = parts.extensions;
        return rebuilt;
    }

    // Cloned so no borrow of the (non-Sync) response is held across an await.
    let cascade = response.extensions().get::<CascadeWarnings>().cloned();
    if let Some(CascadeWarnings(warnings)) = cascade {
        if !warnings.is_empty() {
            for warning in &warnings {
                tracing::warn!(uri = %context.uri, warning = %warning, "cascade incomplete");
            }
            record_event(
                events,
                &context,
                LogLevel::Warn,
                status.as_u16(),
                warnings.join("; "),
            )
            .await;
        }
    }

    if is_mutation(&method) && status.is_success() {
        let message = format!("{} {} {}", context.method, context.uri, status.as_u16());
        record_event(events, &context, LogLevel::Info, status.as_u16(), message).await;
    }

    response
}
