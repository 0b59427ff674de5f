use crate::types::enums::LegType;
use crate::types::geo::Coordinate;
use crate::types::ids::{CheckInId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ephemeral input consumed by the check-in pipeline; never stored as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckInAttempt {
    pub trip_id: String,
    pub leg: LegType,
    pub driver_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub position: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub override_reason: Option<String>,
}

impl CheckInAttempt {
    pub fn override_reason(&self) -> Option<&str> {
        self.override_reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
    }
}

/// Durable, append-only arrival record. One per idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckInEvent {
    pub id: CheckInId,
    pub idempotency_key: String,
    pub trip_id: String,
    pub leg: LegType,
    pub zone_id: ZoneId,
    pub driver_id: Option<String>,
    pub position: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub distance_meters: f64,
    pub radius_meters: f64,
    pub is_override: bool,
    pub override_reason: Option<String>,
    pub bucket: i64,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
