use crate::middleware::actor::Actor;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{ErrorEnvelope, error_response, parse_id};
use crate::{AppState, request_context};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use wp_core::error::NotificationError;
use wp_core::types::{MarkReadInput, Notification, NotificationFilter, NotificationId};
use wp_events::types::EventSource;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route(
            "/notifications/{id}",
            get(get_notification).delete(retire_notification),
        )
        .route("/notifications/{id}/read", post(mark_read))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationFilter),
    responses((status = 200, body = Vec<Notification>))
)]
pub(crate) async fn list_notifications(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<NotificationFilter>,
) -> Response {
    let ctx = request_context(EventSource::Dispatcher, correlation, actor);
    match state.engine.notifications().list(&ctx, &filter) {
        Ok(notifications) => Json(notifications).into_response(),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

#[utoipa::path(
    get,
    path = "/api/notifications/{id}",
    params(("id" = String, Path, description = "Notification ID")),
    responses((status = 200, body = Notification), (status = 404, body = ErrorEnvelope))
)]
pub(crate) async fn get_notification(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id::<NotificationId>(&id, Some(correlation.0.clone())) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.engine.notifications().get(&id) {
        Ok(notification) => Json(notification).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}

/// The body is optional; without one the receipt is recorded for the default
/// recipient group.
#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification ID")),
    request_body = MarkReadInput,
    responses((status = 200, body = Notification), (status = 404, body = ErrorEnvelope))
)]
pub(crate) async fn mark_read(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let ctx = request_context(EventSource::Dispatcher, correlation, actor);
    let id = match parse_id::<NotificationId>(&id, ctx.correlation_id.clone()) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        MarkReadInput::default()
    } else {
        match serde_json::from_slice::<MarkReadInput>(&body) {
            Ok(input) => input,
            Err(err) => {
                let err = NotificationError::InvalidInput {
                    message: err.to_string(),
                };
                return error_response(err, ctx.correlation_id);
            }
        }
    };
    match state
        .engine
        .notifications()
        .mark_read(&ctx, &id, input.recipient_group.as_deref())
    {
        Ok(notification) => Json(notification).into_response(),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

/// Retires rather than deletes; repeating the call is harmless.
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = String, Path, description = "Notification ID")),
    responses((status = 200, body = Notification), (status = 404, body = ErrorEnvelope))
)]
pub(crate) async fn retire_notification(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let ctx = request_context(EventSource::Dispatcher, correlation, actor);
    let id = match parse_id::<NotificationId>(&id, ctx.correlation_id.clone()) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.engine.notifications().retire(&ctx, &id) {
        Ok(notification) => Json(notification).into_response(),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}
