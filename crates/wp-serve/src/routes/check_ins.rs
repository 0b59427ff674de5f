use crate::middleware::actor::Actor;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{ErrorEnvelope, error_response, parse_id};
use crate::{AppState, request_context};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use utoipa::{IntoParams, ToSchema};
use wp_core::types::{CheckInEvent, CheckInId, SubmitCheckInInput};
use wp_events::types::EventSource;

#[derive(Debug, serde::Deserialize, ToSchema, IntoParams)]
pub struct CheckInListQuery {
    trip_id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/check-ins", post(submit_check_in).get(list_check_ins))
        .route("/check-ins/{id}", get(get_check_in))
        .with_state(state)
}

/// Replays within the same time bucket answer with the original event.
#[utoipa::path(
    post,
    path = "/api/check-ins",
    request_body = SubmitCheckInInput,
    responses(
        (status = 200, body = CheckInEvent),
        (status = 400, body = ErrorEnvelope),
        (status = 404, body = ErrorEnvelope),
        (status = 422, body = ErrorEnvelope),
        (status = 503, body = ErrorEnvelope)
    )
)]
pub(crate) async fn submit_check_in(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<SubmitCheckInInput>,
) -> Response {
    let ctx = request_context(EventSource::Driver, correlation, actor);
    let attempt = match input.into_attempt(Utc::now()) {
        Ok(attempt) => attempt,
        Err(err) => return error_response(err, ctx.correlation_id),
    };
    match state.engine.check_ins().submit(&ctx, attempt).await {
        Ok(event) => Json(event).into_response(),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

#[utoipa::path(
    get,
    path = "/api/check-ins",
    params(CheckInListQuery),
    responses((status = 200, body = Vec<CheckInEvent>))
)]
pub(crate) async fn list_check_ins(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<CheckInListQuery>,
) -> Response {
    match state.engine.check_ins().list(query.trip_id.as_deref()) {
        Ok(events) => Json(events).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}

#[utoipa::path(
    get,
    path = "/api/check-ins/{id}",
    params(("id" = String, Path, description = "Check-in ID")),
    responses((status = 200, body = CheckInEvent), (status = 404, body = ErrorEnvelope))
)]
pub(crate) async fn get_check_in(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id::<CheckInId>(&id, Some(correlation.0.clone())) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.engine.check_ins().get(&id) {
        Ok(event) => Json(event).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}
