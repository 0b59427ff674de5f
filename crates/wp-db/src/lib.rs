pub mod audit_repo;
pub mod channel_repo;
pub mod checkin_repo;
pub mod event_repo;
pub mod location_repo;
pub mod notification_repo;
pub mod schema;
pub mod store;
pub mod util;
pub mod zone_repo;

pub use crate::store::{DbStore, SqliteProvider};
