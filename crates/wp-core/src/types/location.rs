use crate::error::LocationError;
use crate::types::enums::{LegType, TransitionKind};
use crate::types::geo::{Coordinate, DwellSample};
use crate::types::ids::{TransitionId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// A validated position report from a driver's device.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub driver_id: String,
    pub trip_id: String,
    pub position: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationUpdateInput {
    pub driver_id: Option<String>,
    pub trip_id: Option<String>,
    pub position: Option<Coordinate>,
    pub accuracy_meters: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationUpdateInput {
    pub fn into_update(self, now: DateTime<Utc>) -> Result<LocationUpdate, LocationError> {
        let driver_id = required(self.driver_id, "driver_id")?;
        let trip_id = required(self.trip_id, "trip_id")?;
        let position = self.position.ok_or_else(|| LocationError::InvalidRequest {
            message: "position is required".to_string(),
        })?;
        Ok(LocationUpdate {
            driver_id,
            trip_id,
            position,
            accuracy_meters: self.accuracy_meters,
            at: self.timestamp.unwrap_or(now),
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, LocationError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LocationError::InvalidRequest {
            message: format!("{field} is required"),
        })
}

/// One stored fix, evaluated against one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationSample {
    pub driver_id: String,
    pub zone_id: ZoneId,
    pub position: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub distance_meters: f64,
    pub inside: bool,
    pub at: DateTime<Utc>,
}

impl LocationSample {
    pub fn as_dwell(&self) -> DwellSample {
        DwellSample {
            at: self.at,
            position: self.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ZoneTransition {
    pub id: TransitionId,
    pub driver_id: String,
    pub zone_id: ZoneId,
    pub trip_id: String,
    pub leg: LegType,
    pub kind: TransitionKind,
    pub position: Coordinate,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ZoneReading {
    pub zone_id: ZoneId,
    pub leg: LegType,
    pub inside: bool,
    pub distance_meters: f64,
    /// Set when this fix crossed the zone boundary.
    pub transition: Option<ZoneTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationUpdateResult {
    pub driver_id: String,
    pub trip_id: String,
    pub recorded_at: DateTime<Utc>,
    pub zones: Vec<ZoneReading>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransitionFilter {
    pub driver_id: Option<String>,
    pub trip_id: Option<String>,
    pub kind: Option<TransitionKind>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_trimmed_and_required() {
        let now = Utc::now();
        let update = LocationUpdateInput {
            driver_id: Some(" drv-7 ".to_string()),
            trip_id: Some("T1 ".to_string()),
            position: Some(Coordinate::new(1.0, 2.0)),
            ..LocationUpdateInput::default()
        }
        .into_update(now)
        .unwrap();
        assert_eq!(update.driver_id, "drv-7");
        assert_eq!(update.trip_id, "T1");
        assert_eq!(update.at, now);

        let blank_driver = LocationUpdateInput {
            driver_id: Some("  ".to_string()),
            trip_id: Some("T1".to_string()),
            position: Some(Coordinate::new(1.0, 2.0)),
            ..LocationUpdateInput::default()
        };
        assert!(matches!(
            blank_driver.into_update(now),
            Err(LocationError::InvalidRequest { .. })
        ));
    }
}
