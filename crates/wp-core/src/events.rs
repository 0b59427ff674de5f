use crate::error::StoreError;
use wp_events::types::EventRecord;

pub trait EventRepository {
    /// Assigns `id` and `seq`, returning the stored record.
    fn append(&self, event: EventRecord) -> Result<EventRecord, StoreError>;
    fn list(&self, after: Option<i64>, limit: Option<u32>) -> Result<Vec<EventRecord>, StoreError>;
}
