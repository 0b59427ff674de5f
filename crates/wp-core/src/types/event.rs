use crate::types::{
    Channel, ChannelId, CheckInEvent, GeofenceZone, Notification, NotificationId, ZoneTransition,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Messages published on the live channel and appended to the event log.
/// Live payloads reuse the REST resource shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventBody {
    ZoneRegistered {
        zone: GeofenceZone,
    },
    CheckInCreated {
        event: CheckInEvent,
    },
    CheckinRequested(Notification),
    NotificationRead {
        notification_id: NotificationId,
        recipient_group: String,
    },
    NotificationRetired {
        notification_id: NotificationId,
        channel_id: Option<ChannelId>,
    },
    ChannelCreated(Channel),
    ZoneTransition(ZoneTransition),
}
