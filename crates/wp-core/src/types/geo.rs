use crate::types::enums::LegType;
use crate::types::ids::ZoneId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneShape {
    Circle {
        radius_meters: f64,
    },
    /// Vertices in order; the ring closes implicitly. `buffer_meters` widens the
    /// boundary outward and is the effective radius reported on failures.
    Polygon {
        vertices: Vec<Coordinate>,
        #[serde(default)]
        buffer_meters: f64,
    },
}

impl ZoneShape {
    pub fn effective_radius_meters(&self) -> f64 {
        match self {
            Self::Circle { radius_meters } => *radius_meters,
            Self::Polygon { buffer_meters, .. } => *buffer_meters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeofenceZone {
    pub id: ZoneId,
    pub trip_id: String,
    pub leg: LegType,
    pub name: String,
    pub center: Coordinate,
    pub shape: ZoneShape,
    pub required_dwell_seconds: u32,
    pub created_at: DateTime<Utc>,
}

/// One tracked fix, used to work out how long a driver has stayed inside a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DwellSample {
    pub at: DateTime<Utc>,
    pub position: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Evaluation {
    pub inside: bool,
    pub distance_meters: f64,
    pub dwell_satisfied: bool,
    pub dwelled_seconds: u32,
}
