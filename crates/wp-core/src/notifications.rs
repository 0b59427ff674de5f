use crate::error::StoreError;
use crate::types::{
    ChannelId, CheckInDetails, CheckInEvent, CheckInId, LegType, Notification, NotificationFilter,
    NotificationId, ReadStatus, TripSheet,
};
use chrono::{DateTime, Utc};

/// Resolved form of a [`NotificationFilter`]: the recipient group is fixed and
/// the date preset has been turned into absolute bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQuery {
    pub recipient_group: String,
    pub status: ReadStatus,
    pub leg: Option<LegType>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Lowercased, trimmed.
    pub search: Option<String>,
}

impl NotificationQuery {
    pub fn from_filter(filter: &NotificationFilter, default_group: &str, now: DateTime<Utc>) -> Self {
        let recipient_group = filter
            .recipient_group
            .as_deref()
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .unwrap_or(default_group)
            .to_string();
        Self {
            recipient_group,
            status: filter.status,
            leg: filter.leg_type,
            created_after: filter.window_start(now),
            created_before: filter.created_before,
            search: filter.search_term(),
        }
    }
}

pub trait NotificationRepository {
    fn insert(&self, notification: &Notification) -> Result<(), StoreError>;
    fn get(&self, id: &NotificationId) -> Result<Option<Notification>, StoreError>;
    fn for_check_in(&self, check_in_id: &CheckInId) -> Result<Option<Notification>, StoreError>;
    /// Newest first.
    fn list(&self, query: &NotificationQuery) -> Result<Vec<Notification>, StoreError>;
    /// Returns `true` only on the unread -> read transition.
    fn mark_read(
        &self,
        id: &NotificationId,
        recipient_group: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Returns `true` only when the notification was still actionable.
    fn retire(
        &self,
        id: &NotificationId,
        channel_id: Option<&ChannelId>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    /// Actionable notifications whose (trip, leg) already has a channel.
    fn stranded(&self) -> Result<Vec<(NotificationId, ChannelId)>, StoreError>;
}

pub fn notification_title(leg: LegType, is_override: bool) -> String {
    let marker = if is_override { " (Override)" } else { "" };
    format!("Driver {} check-in{marker}", leg.as_str())
}

pub fn notification_message(driver_name: &str, location: &str, is_override: bool) -> String {
    let marker = if is_override { " - OVERRIDE USED" } else { "" };
    format!("Driver {driver_name} checked in at {location}{marker}")
}

/// Builds the unread notification projected from a freshly created check-in.
pub fn compose(
    event: &CheckInEvent,
    sheet: &TripSheet,
    recipient_groups: &[String],
    now: DateTime<Utc>,
) -> Notification {
    let location = sheet.location(event.leg);
    Notification {
        id: NotificationId::generate(),
        check_in_id: event.id.clone(),
        trip_id: event.trip_id.clone(),
        leg: event.leg,
        title: notification_title(event.leg, event.is_override),
        message: notification_message(&sheet.driver_name, &location.name, event.is_override),
        trip: sheet.summary(),
        location,
        check_in: CheckInDetails {
            position: event.position,
            distance_meters: event.distance_meters,
            recorded_at: event.recorded_at,
            is_override: event.is_override,
            override_reason: event.override_reason.clone(),
        },
        recipient_groups: recipient_groups.to_vec(),
        read_by: Vec::new(),
        channel_id: None,
        retired_at: None,
        created_at: now,
    }
}
