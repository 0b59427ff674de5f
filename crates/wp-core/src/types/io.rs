use crate::error::{ChannelError, CheckInError, ZoneError};
use crate::types::channel::ChannelRequest;
use crate::types::checkin::CheckInAttempt;
use crate::types::enums::LegType;
use crate::types::geo::{Coordinate, GeofenceZone, ZoneShape};
use crate::types::ids::NotificationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegisterZoneInput {
    pub trip_id: String,
    pub leg: LegType,
    pub name: String,
    pub center: Coordinate,
    pub shape: ZoneShape,
    #[serde(default)]
    pub required_dwell_seconds: u32,
}

impl RegisterZoneInput {
    pub fn validate(&self, max_radius_meters: f64) -> Result<(), ZoneError> {
        if self.trip_id.trim().is_empty() {
            return Err(ZoneError::InvalidInput {
                message: "trip_id is required".to_string(),
            });
        }
        if self.name.trim().is_empty() {
            return Err(ZoneError::InvalidInput {
                message: "name is required".to_string(),
            });
        }
        if !self.center.is_valid() {
            return Err(ZoneError::InvalidInput {
                message: "center is not a valid coordinate".to_string(),
            });
        }
        if let ZoneShape::Circle { radius_meters } = self.shape {
            if radius_meters > max_radius_meters {
                return Err(ZoneError::InvalidZoneConfig {
                    reason: format!(
                        "radius {radius_meters}m exceeds maximum {max_radius_meters}m"
                    ),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubmitCheckInInput {
    pub trip_id: Option<String>,
    pub leg: Option<LegType>,
    pub driver_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub position: Option<Coordinate>,
    pub accuracy_meters: Option<f64>,
    pub override_reason: Option<String>,
}

impl SubmitCheckInInput {
    /// Missing required identifiers become `InvalidRequest` rather than a
    /// deserialization failure, so clients see one error shape.
    pub fn into_attempt(self, now: DateTime<Utc>) -> Result<CheckInAttempt, CheckInError> {
        let trip_id = self
            .trip_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CheckInError::InvalidRequest {
                message: "trip_id is required".to_string(),
            })?;
        let leg = self.leg.ok_or_else(|| CheckInError::InvalidRequest {
            message: "leg is required".to_string(),
        })?;
        let position = self.position.ok_or_else(|| CheckInError::InvalidRequest {
            message: "position is required".to_string(),
        })?;
        Ok(CheckInAttempt {
            trip_id,
            leg,
            driver_id: self
                .driver_id
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            timestamp: self.timestamp.unwrap_or(now),
            position,
            accuracy_meters: self.accuracy_meters,
            override_reason: self.override_reason,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateChannelInput {
    pub notification_id: Option<String>,
    pub trip_id: Option<String>,
    pub leg: Option<LegType>,
    pub po_number: Option<String>,
    pub driver_id: Option<String>,
}

impl TryFrom<CreateChannelInput> for ChannelRequest {
    type Error = ChannelError;

    fn try_from(input: CreateChannelInput) -> Result<Self, Self::Error> {
        if let Some(id) = input.notification_id.filter(|id| !id.trim().is_empty()) {
            let notification_id =
                NotificationId::new(id).map_err(|err| ChannelError::InvalidRequest {
                    message: err.to_string(),
                })?;
            return Ok(Self::Notification { notification_id });
        }
        let trip_id = input
            .trip_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ChannelError::InvalidRequest {
                message: "notification_id or trip_id is required".to_string(),
            })?;
        let leg = input.leg.ok_or_else(|| ChannelError::InvalidRequest {
            message: "leg is required for ad hoc channels".to_string(),
        })?;
        Ok(Self::AdHoc {
            trip_id,
            leg,
            po_number: input.po_number.filter(|value| !value.trim().is_empty()),
            driver_id: input.driver_id.filter(|value| !value.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MarkReadInput {
    pub recipient_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearbyZonesQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NearbyZone {
    pub zone: GeofenceZone,
    pub distance_meters: f64,
    pub inside: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_position_is_an_invalid_request() {
        let input = SubmitCheckInInput {
            trip_id: Some("T1".to_string()),
            leg: Some(LegType::Pickup),
            ..SubmitCheckInInput::default()
        };
        let err = input.into_attempt(Utc::now()).unwrap_err();
        assert!(matches!(err, CheckInError::InvalidRequest { .. }));
    }

    #[test]
    fn padded_identifiers_are_trimmed() {
        let input = SubmitCheckInInput {
            trip_id: Some(" T1 ".to_string()),
            leg: Some(LegType::Pickup),
            driver_id: Some(" ".to_string()),
            position: Some(crate::types::geo::Coordinate::new(0.0, 0.0)),
            ..SubmitCheckInInput::default()
        };
        let attempt = input.into_attempt(Utc::now()).unwrap();
        assert_eq!(attempt.trip_id, "T1");
        assert_eq!(attempt.driver_id, None);
    }

    #[test]
    fn notification_reference_wins_over_ad_hoc_fields() {
        let id = NotificationId::generate();
        let input = CreateChannelInput {
            notification_id: Some(id.to_string()),
            trip_id: Some("T1".to_string()),
            ..CreateChannelInput::default()
        };
        assert_eq!(
            ChannelRequest::try_from(input).unwrap(),
            ChannelRequest::Notification {
                notification_id: id
            }
        );
    }

    #[test]
    fn ad_hoc_request_requires_leg() {
        let input = CreateChannelInput {
            trip_id: Some("T1".to_string()),
            ..CreateChannelInput::default()
        };
        assert!(matches!(
            ChannelRequest::try_from(input),
            Err(ChannelError::InvalidRequest { .. })
        ));
    }
}
