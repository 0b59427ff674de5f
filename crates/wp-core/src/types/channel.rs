use crate::types::enums::LegType;
use crate::types::ids::{ChannelId, NotificationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Channel {
    pub id: ChannelId,
    /// Opaque identifier assigned by the channel-hosting subsystem.
    pub external_id: String,
    pub trip_id: String,
    pub leg: LegType,
    pub po_number: Option<String>,
    pub driver_id: Option<String>,
    pub name: String,
    pub description: String,
    pub source_notification_id: Option<NotificationId>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ChannelRequest {
    /// A dispatcher acting on a check-in notification.
    Notification { notification_id: NotificationId },
    AdHoc {
        trip_id: String,
        leg: LegType,
        po_number: Option<String>,
        driver_id: Option<String>,
    },
}

/// What the channel host is asked to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChannelSpec {
    /// Stable per (trip, leg) so an idempotent host can dedupe retries.
    pub idempotency_key: String,
    pub name: String,
    pub description: String,
    pub trip_id: String,
    pub leg: LegType,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HostedChannel {
    pub external_id: String,
}
