use crate::types::enums::LegType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Stop {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub appointment: Option<DateTime<Utc>>,
}

/// Read-only trip-sheet row as returned by the trip-sheet directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TripSheet {
    pub trip_id: String,
    pub trip_number: String,
    pub driver_id: String,
    pub driver_name: String,
    #[serde(default)]
    pub driver_phone: Option<String>,
    pub vehicle_number: String,
    #[serde(default)]
    pub trailer_number: Option<String>,
    pub po_number: String,
    pub pickup: Stop,
    pub delivery: Stop,
    #[serde(default)]
    pub load_description: Option<String>,
}

impl TripSheet {
    pub fn stop(&self, leg: LegType) -> &Stop {
        match leg {
            LegType::Pickup => &self.pickup,
            LegType::Delivery => &self.delivery,
        }
    }

    pub fn summary(&self) -> TripSummary {
        TripSummary {
            trip_number: self.trip_number.clone(),
            driver_id: self.driver_id.clone(),
            driver_name: self.driver_name.clone(),
            driver_phone: self.driver_phone.clone(),
            vehicle_number: self.vehicle_number.clone(),
            trailer_number: self.trailer_number.clone(),
            po_number: self.po_number.clone(),
            pickup: self.pickup.clone(),
            delivery: self.delivery.clone(),
            load_description: self.load_description.clone(),
        }
    }

    pub fn location(&self, leg: LegType) -> LocationSummary {
        let stop = self.stop(leg);
        LocationSummary {
            name: stop.name.clone(),
            address: stop.address.clone(),
            phone: stop.phone.clone(),
        }
    }
}

/// Denormalized copy of the trip sheet carried on a notification for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TripSummary {
    pub trip_number: String,
    pub driver_id: String,
    pub driver_name: String,
    pub driver_phone: Option<String>,
    pub vehicle_number: String,
    pub trailer_number: Option<String>,
    pub po_number: String,
    pub pickup: Stop,
    pub delivery: Stop,
    pub load_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LocationSummary {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}
