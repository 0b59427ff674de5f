use crate::middleware::actor::Actor;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{error_response, parse_id};
use crate::{AppState, request_context};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use utoipa::{IntoParams, ToSchema};
use wp_core::types::{GeofenceZone, NearbyZone, NearbyZonesQuery, RegisterZoneInput, ZoneId};
use wp_events::types::EventSource;

#[derive(Debug, serde::Deserialize, ToSchema, IntoParams)]
pub struct ZoneListQuery {
    trip_id: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/zones", post(register_zone).get(list_zones))
        .route("/zones/nearby", get(nearby_zones))
        .route("/zones/{id}", get(get_zone))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/zones",
    request_body = RegisterZoneInput,
    responses(
        (status = 200, body = GeofenceZone),
        (status = 409, body = crate::routes::error::ErrorEnvelope),
        (status = 422, body = crate::routes::error::ErrorEnvelope)
    )
)]
pub(crate) async fn register_zone(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<RegisterZoneInput>,
) -> Response {
    let ctx = request_context(EventSource::System, correlation, actor);
    match state.engine.zones().register(&ctx, input) {
        Ok(zone) => Json(zone).into_response(),
        Err(err) => error_response(err, ctx.correlation_id),
    }
}

#[utoipa::path(
    get,
    path = "/api/zones",
    params(ZoneListQuery),
    responses((status = 200, body = Vec<GeofenceZone>))
)]
pub(crate) async fn list_zones(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<ZoneListQuery>,
) -> Response {
    match state.engine.zones().list(query.trip_id.as_deref()) {
        Ok(zones) => Json(zones).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}

#[utoipa::path(
    get,
    path = "/api/zones/nearby",
    params(NearbyZonesQuery),
    responses((status = 200, body = Vec<NearbyZone>))
)]
pub(crate) async fn nearby_zones(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<NearbyZonesQuery>,
) -> Response {
    match state.engine.zones().nearby(&query) {
        Ok(zones) => Json(zones).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}

#[utoipa::path(
    get,
    path = "/api/zones/{id}",
    params(("id" = String, Path, description = "Zone ID")),
    responses((status = 200, body = GeofenceZone), (status = 404, body = crate::routes::error::ErrorEnvelope))
)]
pub(crate) async fn get_zone(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id::<ZoneId>(&id, Some(correlation.0.clone())) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match state.engine.zones().get(&id) {
        Ok(zone) => Json(zone).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}
