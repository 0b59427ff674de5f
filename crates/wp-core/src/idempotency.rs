use crate::types::enums::LegType;
use crate::types::ids::ZoneId;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Coarse time bucket for an attempt: `floor(unix_seconds / bucket_secs)`.
pub fn time_bucket(at: DateTime<Utc>, bucket_secs: u64) -> i64 {
    let width = i64::try_from(bucket_secs.max(1)).unwrap_or(i64::MAX);
    at.timestamp().div_euclid(width)
}

/// Lowercase hex SHA-256 of `trip|leg|zone|bucket`.
pub fn check_in_key(trip_id: &str, leg: LegType, zone_id: &ZoneId, bucket: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{trip_id}|{}|{zone_id}|{bucket}", leg.as_str()).as_bytes());
    hex::encode(hasher.finalize())
}

/// Orchestration key handed to the channel host so retries dedupe there too.
pub fn channel_key(trip_id: &str, leg: LegType) -> String {
    format!("{trip_id}:{}", leg.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn attempts_inside_one_bucket_share_a_key() {
        let zone = ZoneId::generate();
        let first = Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 5).unwrap();
        let retry = Utc.with_ymd_and_hms(2026, 4, 2, 9, 29, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap();

        let key = |at| check_in_key("T1", LegType::Pickup, &zone, time_bucket(at, 1800));
        assert_eq!(key(first), key(retry));
        assert_ne!(key(first), key(later));
    }

    #[test]
    fn key_depends_on_leg_and_is_hex() {
        let zone = ZoneId::generate();
        let pickup = check_in_key("T1", LegType::Pickup, &zone, 10);
        let delivery = check_in_key("T1", LegType::Delivery, &zone, 10);
        assert_ne!(pickup, delivery);
        assert_eq!(pickup.len(), 64);
        assert!(pickup.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn pre_epoch_timestamps_floor_downward() {
        let at = Utc.timestamp_opt(-1, 0).unwrap();
        assert_eq!(time_bucket(at, 1800), -1);
    }
}
