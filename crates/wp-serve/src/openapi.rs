use utoipa::OpenApi;

use crate::routes::channels::ChannelListQuery;
use crate::routes::check_ins::CheckInListQuery;
use crate::routes::error::ErrorEnvelope;
use crate::routes::events::EventsQuery;
use crate::routes::health::Health;
use crate::routes::zones::ZoneListQuery;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use wp_core::types::{
    AuditAction, AuditEntry, AuditFilter, Channel, CheckInDetails, CheckInEvent, Coordinate,
    CreateChannelInput, DateRange, GeofenceZone, LegType, LocationSummary, LocationUpdateInput,
    LocationUpdateResult, MarkReadInput, NearbyZone, Notification, NotificationFilter, ReadStatus,
    RecipientRead, RegisterZoneInput, Stop, SubjectKind, SubjectRef, SubmitCheckInInput,
    TransitionFilter, TransitionKind, TripSummary, ZoneReading, ZoneShape, ZoneTransition,
};
use wp_events::types::{EventRecord, EventSource};

#[derive(OpenApi)]
#[openapi(
    info(title = "waypost", description = "Geofence check-ins and dispatcher channels"),
    paths(
        crate::routes::health::health,
        crate::routes::zones::register_zone,
        crate::routes::zones::list_zones,
        crate::routes::zones::nearby_zones,
        crate::routes::zones::get_zone,
        crate::routes::check_ins::submit_check_in,
        crate::routes::check_ins::list_check_ins,
        crate::routes::check_ins::get_check_in,
        crate::routes::locations::record_location,
        crate::routes::locations::list_transitions,
        crate::routes::notifications::list_notifications,
        crate::routes::notifications::get_notification,
        crate::routes::notifications::mark_read,
        crate::routes::notifications::retire_notification,
        crate::routes::channels::create_channel,
        crate::routes::channels::list_channels,
        crate::routes::channels::get_channel,
        crate::routes::audit::list_audit,
        crate::routes::events::list_events,
        crate::routes::live::subscribe,
        crate::routes::live::stream,
    ),
    components(schemas(
        ErrorEnvelope,
        Health,
        ZoneListQuery,
        CheckInListQuery,
        ChannelListQuery,
        EventsQuery,
        EventRecord,
        EventSource,
        Coordinate,
        ZoneShape,
        GeofenceZone,
        NearbyZone,
        RegisterZoneInput,
        SubmitCheckInInput,
        CheckInEvent,
        LocationUpdateInput,
        LocationUpdateResult,
        ZoneReading,
        ZoneTransition,
        TransitionFilter,
        TransitionKind,
        Stop,
        TripSummary,
        LocationSummary,
        CheckInDetails,
        RecipientRead,
        Notification,
        NotificationFilter,
        MarkReadInput,
        CreateChannelInput,
        Channel,
        AuditEntry,
        AuditFilter,
        AuditAction,
        SubjectRef,
        SubjectKind,
        LegType,
        ReadStatus,
        DateRange
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> impl IntoResponse {
    let html = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>waypost API</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({ url: '/api/openapi.json', dom_id: '#swagger-ui' });
    </script>
  </body>
</html>
"#;
    axum::response::Html(html)
}
