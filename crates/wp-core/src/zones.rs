use crate::error::StoreError;
use crate::types::{GeofenceZone, LegType, ZoneId};

pub trait ZoneRepository {
    /// Fails with `UniqueViolation` when (trip, leg) already has a zone.
    fn insert(&self, zone: &GeofenceZone) -> Result<(), StoreError>;
    fn get(&self, id: &ZoneId) -> Result<Option<GeofenceZone>, StoreError>;
    fn for_leg(&self, trip_id: &str, leg: LegType) -> Result<Option<GeofenceZone>, StoreError>;
    fn list(&self, trip_id: Option<&str>) -> Result<Vec<GeofenceZone>, StoreError>;
}
