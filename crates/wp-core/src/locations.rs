use crate::error::StoreError;
use crate::types::{LocationSample, TransitionFilter, TransitionKind, ZoneId, ZoneTransition};
use chrono::{DateTime, Utc};

/// Append-only fix history per (driver, zone) plus the boundary crossings
/// derived from it.
pub trait LocationRepository {
    fn insert_sample(&self, sample: &LocationSample) -> Result<(), StoreError>;
    /// Most recent sample taken at or before `at`.
    fn last_sample(
        &self,
        driver_id: &str,
        zone_id: &ZoneId,
        at: DateTime<Utc>,
    ) -> Result<Option<LocationSample>, StoreError>;
    /// Samples with `since <= at <= until`, oldest first.
    fn samples(
        &self,
        driver_id: &str,
        zone_id: &ZoneId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LocationSample>, StoreError>;
    fn insert_transition(&self, transition: &ZoneTransition) -> Result<(), StoreError>;
    /// Newest first.
    fn transitions(&self, filter: &TransitionFilter) -> Result<Vec<ZoneTransition>, StoreError>;
}

/// Enter on the first inside fix or after an outside one; exit only after an
/// inside one.
pub fn transition_kind(previously_inside: Option<bool>, inside: bool) -> Option<TransitionKind> {
    match (previously_inside, inside) {
        (None | Some(false), true) => Some(TransitionKind::Enter),
        (Some(true), false) => Some(TransitionKind::Exit),
        _ => None,
    }
}
