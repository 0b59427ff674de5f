use crate::types::enums::{DateRange, LegType, ReadStatus};
use crate::types::geo::Coordinate;
use crate::types::ids::{ChannelId, CheckInId, NotificationId};
use crate::types::trip::{LocationSummary, TripSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckInDetails {
    pub position: Coordinate,
    pub distance_meters: f64,
    pub recorded_at: DateTime<Utc>,
    pub is_override: bool,
    pub override_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipientRead {
    pub recipient_group: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: NotificationId,
    pub check_in_id: CheckInId,
    pub trip_id: String,
    pub leg: LegType,
    pub title: String,
    pub message: String,
    pub trip: TripSummary,
    pub location: LocationSummary,
    pub check_in: CheckInDetails,
    pub recipient_groups: Vec<String>,
    pub read_by: Vec<RecipientRead>,
    pub channel_id: Option<ChannelId>,
    pub retired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_read_by(&self, group: &str) -> bool {
        self.read_by.iter().any(|read| read.recipient_group == group)
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationFilter {
    #[serde(default)]
    pub status: ReadStatus,
    pub leg_type: Option<LegType>,
    pub date_range: Option<DateRange>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub recipient_group: Option<String>,
}

impl NotificationFilter {
    /// Lower bound of the creation window: the later of the preset range and
    /// the explicit `created_after`.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let preset = self.date_range.map(|range| now - range.duration());
        match (preset, self.created_after) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}
