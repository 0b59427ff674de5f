use crate::types::enums::LegType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("zone not found")]
    NotFound,
    #[error("zone already registered for trip {trip_id} {leg}")]
    AlreadyRegistered { trip_id: String, leg: LegType },
    #[error("invalid zone config: {reason}")]
    InvalidZoneConfig { reason: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    #[error(
        "outside geofence: {distance_meters:.1}m from zone, required within {required_radius_meters:.1}m"
    )]
    OutsideGeofence {
        distance_meters: f64,
        required_radius_meters: f64,
    },
    #[error("dwell not satisfied: {dwelled_seconds}s of {required_seconds}s")]
    DwellNotSatisfied {
        dwelled_seconds: u32,
        required_seconds: u32,
    },
    #[error("trip not found: {trip_id}")]
    TripNotFound { trip_id: String },
    #[error("check-in not found")]
    NotFound,
    /// Lost an insert race on the idempotency key; resolved to the winner's event.
    #[error("duplicate check-in for key {idempotency_key}")]
    DuplicateEvent { idempotency_key: String },
}

impl CheckInError {
    pub fn outside(distance_meters: f64, required_radius_meters: f64) -> Self {
        Self::OutsideGeofence {
            distance_meters,
            required_radius_meters,
        }
    }

    /// Meters the driver still has to close, for "move N meters closer" feedback.
    pub fn shortfall_meters(&self) -> Option<f64> {
        match self {
            Self::OutsideGeofence {
                distance_meters,
                required_radius_meters,
            } => Some((distance_meters - required_radius_meters).max(0.0)),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    #[error("channel not found")]
    NotFound,
    #[error("notification not found")]
    NotificationNotFound,
    /// Lost the insert race on (trip, leg); resolved to the winner's channel.
    #[error("channel already created for trip {trip_id} {leg}")]
    DuplicateChannelRace { trip_id: String, leg: LegType },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {message}")]
    UniqueViolation { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("corrupt row: {message}")]
    Corrupt { message: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Zone(#[from] ZoneError),
    #[error(transparent)]
    CheckIn(#[from] CheckInError),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{collaborator} unavailable: {reason}")]
    UpstreamUnavailable {
        collaborator: &'static str,
        reason: String,
    },
    #[error("internal error: {message}")]
    Internal { message: String },
}
