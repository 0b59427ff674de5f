use crate::middleware::actor::Actor;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{ErrorEnvelope, error_response, parse_id};
use crate::{AppState, request_context};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use utoipa::{IntoParams, ToSchema};
use wp_core::types::{Channel, ChannelId, ChannelRequest, CreateChannelInput};
use wp_events::types::EventSource;

#[derive(Debug, serde::Deserialize, ToSchema, IntoParams)]
pub struct ChannelListQuery {
    trip_id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/channels", post(create_channel).get(list_channels))
        .route("/channels/{id}", get(get_channel))
        .with_state(state)
}

/// Every caller racing on the same trip leg gets the one channel that won.
#[utoipa::path(
    post,
    path = "/api/channels",
    request_body = CreateChannelInput,
    responses(
        (status = 200, body = Channel),
        (status = 400, body = ErrorEnvelope),
        (status = 404, body = ErrorEnvelope),
        (status = 503, body = ErrorEnvelope)
    )
)]
pub(crate) async fn create_channel(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<CreateChannelInput>,
) -> Response {
    let ctx = request_context(EventSource::Dispatcher, correlation, actor);
    let request = match ChannelRequest::try_from(input) {
        Ok(request) => request,
        Err(err) => return error_response(err, ctx.correlation_id),
    };
    match state.engine.channels().create(&ctx, request).await {
        Ok(channel) => Json(channel).into_response(),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

#[utoipa::path(
    get,
    path = "/api/channels",
    params(ChannelListQuery),
    responses((status = 200, body = Vec<Channel>))
)]
pub(crate) async fn list_channels(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<ChannelListQuery>,
) -> Response {
    match state.engine.channels().list(query.trip_id.as_deref()) {
        Ok(channels) => Json(channels).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}

#[utoipa::path(
    get,
    path = "/api/channels/{id}",
    params(("id" = String, Path, description = "Channel ID")),
    responses((status = 200, body = Channel), (status = 404, body = ErrorEnvelope))
)]
pub(crate) async fn get_channel(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id::<ChannelId>(&id, Some(correlation.0.clone())) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.engine.channels().get(&id) {
        Ok(channel) => Json(channel).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}
