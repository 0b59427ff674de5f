use crate::error::StoreError;
use crate::types::{CheckInEvent, CheckInId};

/// Append-only. There is deliberately no update or delete.
pub trait CheckInRepository {
    /// Fails with `UniqueViolation` when the idempotency key is taken.
    fn insert(&self, event: &CheckInEvent) -> Result<(), StoreError>;
    fn get(&self, id: &CheckInId) -> Result<Option<CheckInEvent>, StoreError>;
    fn get_by_key(&self, idempotency_key: &str) -> Result<Option<CheckInEvent>, StoreError>;
    fn list(&self, trip_id: Option<&str>) -> Result<Vec<CheckInEvent>, StoreError>;
}
