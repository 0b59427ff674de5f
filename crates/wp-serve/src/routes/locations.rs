use crate::middleware::actor::Actor;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{ErrorEnvelope, error_response};
use crate::{AppState, request_context};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use wp_core::types::{LocationUpdateInput, LocationUpdateResult, TransitionFilter, ZoneTransition};
use wp_events::types::EventSource;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/locations", post(record_location))
        .route("/locations/transitions", get(list_transitions))
        .with_state(state)
}

/// Records a tracked fix; stored fixes back the dwell check on check-ins.
#[utoipa::path(
    post,
    path = "/api/locations",
    request_body = LocationUpdateInput,
    responses(
        (status = 200, body = LocationUpdateResult),
        (status = 400, body = ErrorEnvelope)
    )
)]
pub(crate) async fn record_location(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<LocationUpdateInput>,
) -> Response {
    let ctx = request_context(EventSource::Driver, correlation, actor);
    let update = match input.into_update(Utc::now()) {
        Ok(update) => update,
        Err(err) => return error_response(err, ctx.correlation_id),
    };
    match state.engine.locations().record(&ctx, update) {
        Ok(result) => Json(result).into_response(),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

#[utoipa::path(
    get,
    path = "/api/locations/transitions",
    params(TransitionFilter),
    responses((status = 200, body = Vec<ZoneTransition>))
)]
pub(crate) async fn list_transitions(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(filter): Query<TransitionFilter>,
) -> Response {
    match state.engine.locations().transitions(&filter) {
        Ok(transitions) => Json(transitions).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}
