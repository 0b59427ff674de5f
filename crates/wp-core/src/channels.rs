use crate::error::StoreError;
use crate::types::{Channel, ChannelId, LegType};

pub trait ChannelRepository {
    /// Fails with `UniqueViolation` when (trip, leg) already has a channel.
    fn insert(&self, channel: &Channel) -> Result<(), StoreError>;
    fn get(&self, id: &ChannelId) -> Result<Option<Channel>, StoreError>;
    fn for_leg(&self, trip_id: &str, leg: LegType) -> Result<Option<Channel>, StoreError>;
    fn list(&self, trip_id: Option<&str>) -> Result<Vec<Channel>, StoreError>;
}

/// `Trip-{tripNumber}-{location}` with whitespace stripped from the location.
pub fn channel_name(trip_number: &str, location: &str) -> String {
    let location: String = location.split_whitespace().collect();
    format!("Trip-{trip_number}-{location}")
}

pub fn channel_description(trip_number: &str, location: &str) -> String {
    format!("Trip communication for {trip_number} at {location}")
}

/// Labels for an ad hoc channel, which has no trip summary to draw on: the raw
/// trip id stands in for the trip number and the PO number (or leg) for the
/// location.
pub fn ad_hoc_labels(trip_id: &str, leg: LegType, po_number: Option<&str>) -> (String, String) {
    let location = po_number.map_or_else(|| leg.as_str().to_string(), str::to_string);
    (trip_id.to_string(), location)
}
