use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Display;
use std::str::FromStr;
use utoipa::ToSchema;
use wp_core::EngineError;
use wp_core::error::{
    ChannelError, CheckInError, LocationError, NotificationError, StoreError, ZoneError,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

type Mapped = (StatusCode, &'static str, Option<Value>);

pub fn map_error(
    err: &EngineError,
    correlation_id: Option<String>,
) -> (StatusCode, Json<ErrorEnvelope>) {
    let (status, code, details) = match err {
        EngineError::Zone(zone) => map_zone_error(zone),
        EngineError::CheckIn(check_in) => map_check_in_error(check_in),
        EngineError::Location(LocationError::InvalidRequest { .. }) => {
            (StatusCode::BAD_REQUEST, "invalid_request", None)
        }
        EngineError::Notification(notification) => map_notification_error(notification),
        EngineError::Channel(channel) => map_channel_error(channel),
        EngineError::Store(store) => map_store_error(store),
        EngineError::UpstreamUnavailable { collaborator, .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream_unavailable",
            Some(json!({ "collaborator": collaborator })),
        ),
        EngineError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
    };
    if status.is_server_error() {
        tracing::error!(code, error = %err, correlation_id = ?correlation_id, "request failed");
    }

    (
        status,
        Json(ErrorEnvelope {
            code,
            message: err.to_string(),
            correlation_id,
            details,
        }),
    )
}

pub fn error_response(err: impl Into<EngineError>, correlation_id: Option<String>) -> Response {
    map_error(&err.into(), correlation_id).into_response()
}

/// Parses a prefixed id from a path segment, answering 400 when it is malformed.
pub fn parse_id<T>(raw: &str, correlation_id: Option<String>) -> Result<T, Response>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>().map_err(|err| {
        let envelope = ErrorEnvelope {
            code: "invalid_input",
            message: format!("invalid id: {err}"),
            correlation_id,
            details: None,
        };
        (StatusCode::BAD_REQUEST, Json(envelope)).into_response()
    })
}

fn map_zone_error(err: &ZoneError) -> Mapped {
    match err {
        ZoneError::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
        ZoneError::AlreadyRegistered { .. } => (StatusCode::CONFLICT, "conflict", None),
        ZoneError::InvalidZoneConfig { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_zone_config", None)
        }
        ZoneError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "invalid_input", None),
    }
}

fn map_check_in_error(err: &CheckInError) -> Mapped {
    match err {
        CheckInError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request", None),
        CheckInError::OutsideGeofence {
            distance_meters,
            required_radius_meters,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "outside_geofence",
            Some(json!({
                "distance_meters": distance_meters,
                "required_radius_meters": required_radius_meters,
                "shortfall_meters": err.shortfall_meters(),
            })),
        ),
        CheckInError::DwellNotSatisfied {
            dwelled_seconds,
            required_seconds,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "dwell_not_satisfied",
            Some(json!({
                "dwelled_seconds": dwelled_seconds,
                "required_seconds": required_seconds,
            })),
        ),
        CheckInError::TripNotFound { .. } | CheckInError::NotFound => {
            (StatusCode::NOT_FOUND, "not_found", None)
        }
        CheckInError::DuplicateEvent { .. } => (StatusCode::CONFLICT, "conflict", None),
    }
}

fn map_notification_error(err: &NotificationError) -> Mapped {
    match err {
        NotificationError::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
        NotificationError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "invalid_input", None),
    }
}

fn map_channel_error(err: &ChannelError) -> Mapped {
    match err {
        ChannelError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request", None),
        ChannelError::NotFound | ChannelError::NotificationNotFound => {
            (StatusCode::NOT_FOUND, "not_found", None)
        }
        ChannelError::DuplicateChannelRace { .. } => (StatusCode::CONFLICT, "conflict", None),
    }
}

fn map_store_error(err: &StoreError) -> Mapped {
    match err {
        StoreError::UniqueViolation { .. } => (StatusCode::CONFLICT, "conflict", None),
        StoreError::Storage { .. } | StoreError::Corrupt { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
        }
    }
}
