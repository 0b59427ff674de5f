use crate::util::{corrupt, decode_enum, encode_enum, from_rfc3339, parse_id, storage, to_rfc3339};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use wp_core::error::StoreError;
use wp_core::locations::LocationRepository;
use wp_core::types::{
    Coordinate, LocationSample, TransitionFilter, TransitionId, ZoneId, ZoneTransition,
};

const SAMPLE_COLUMNS: &str =
    "driver_id, zone_id, latitude, longitude, accuracy_meters, distance_meters, inside, at";
const TRANSITION_COLUMNS: &str = "id, driver_id, zone_id, trip_id, leg, kind, latitude, longitude, at";

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

pub struct LocationRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> LocationRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl LocationRepository for LocationRepo<'_> {
    fn insert_sample(&self, sample: &LocationSample) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO location_samples ({SAMPLE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        );
        let params = rusqlite::params![
            sample.driver_id,
            sample.zone_id.as_str(),
            sample.position.latitude,
            sample.position.longitude,
            sample.accuracy_meters,
            sample.distance_meters,
            sample.inside,
            to_rfc3339(&sample.at),
        ];
        self.conn.execute(&sql, params).map_err(storage)?;
        Ok(())
    }

    fn last_sample(
        &self,
        driver_id: &str,
        zone_id: &ZoneId,
        at: DateTime<Utc>,
    ) -> Result<Option<LocationSample>, StoreError> {
        let sql = format!(
            "SELECT {SAMPLE_COLUMNS} FROM location_samples \
             WHERE driver_id = ?1 AND zone_id = ?2 AND at <= ?3 \
             ORDER BY at DESC, seq DESC LIMIT 1"
        );
        let row = self
            .conn
            .query_row(
                &sql,
                (driver_id, zone_id.as_str(), to_rfc3339(&at)),
                read_sample,
            )
            .optional()
            .map_err(storage)?;
        row.map(SampleRow::into_sample).transpose()
    }

    fn samples(
        &self,
        driver_id: &str,
        zone_id: &ZoneId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<LocationSample>, StoreError> {
        let sql = format!(
            "SELECT {SAMPLE_COLUMNS} FROM location_samples \
             WHERE driver_id = ?1 AND zone_id = ?2 AND at >= ?3 AND at <= ?4 \
             ORDER BY at ASC, seq ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(
                (driver_id, zone_id.as_str(), to_rfc3339(&since), to_rfc3339(&until)),
                read_sample,
            )
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter().map(SampleRow::into_sample).collect()
    }

    fn insert_transition(&self, transition: &ZoneTransition) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO zone_transitions ({TRANSITION_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        let params = rusqlite::params![
            transition.id.as_str(),
            transition.driver_id,
            transition.zone_id.as_str(),
            transition.trip_id,
            encode_enum(&transition.leg).map_err(corrupt)?,
            encode_enum(&transition.kind).map_err(corrupt)?,
            transition.position.latitude,
            transition.position.longitude,
            to_rfc3339(&transition.at),
        ];
        self.conn.execute(&sql, params).map_err(storage)?;
        Ok(())
    }

    fn transitions(&self, filter: &TransitionFilter) -> Result<Vec<ZoneTransition>, StoreError> {
        let kind = filter
            .kind
            .as_ref()
            .map(encode_enum)
            .transpose()
            .map_err(corrupt)?;
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM zone_transitions \
             WHERE (?1 IS NULL OR driver_id = ?1) AND (?2 IS NULL OR trip_id = ?2) \
             AND (?3 IS NULL OR kind = ?3) \
             ORDER BY at DESC, id DESC LIMIT ?4"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(
                (
                    filter.driver_id.as_deref(),
                    filter.trip_id.as_deref(),
                    kind,
                    limit,
                ),
                read_transition,
            )
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter().map(TransitionRow::into_transition).collect()
    }
}

struct SampleRow {
    driver_id: String,
    zone_id: String,
    latitude: f64,
    longitude: f64,
    accuracy_meters: Option<f64>,
    distance_meters: f64,
    inside: bool,
    at: String,
}

fn read_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<SampleRow> {
    Ok(SampleRow {
        driver_id: row.get(0)?,
        zone_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        accuracy_meters: row.get(4)?,
        distance_meters: row.get(5)?,
        inside: row.get(6)?,
        at: row.get(7)?,
    })
}

impl SampleRow {
    fn into_sample(self) -> Result<LocationSample, StoreError> {
        Ok(LocationSample {
            driver_id: self.driver_id,
            zone_id: parse_id(self.zone_id, ZoneId::new).map_err(corrupt)?,
            position: Coordinate::new(self.latitude, self.longitude),
            accuracy_meters: self.accuracy_meters,
            distance_meters: self.distance_meters,
            inside: self.inside,
            at: from_rfc3339(&self.at).map_err(corrupt)?,
        })
    }
}

struct TransitionRow {
    id: String,
    driver_id: String,
    zone_id: String,
    trip_id: String,
    leg: String,
    kind: String,
    latitude: f64,
    longitude: f64,
    at: String,
}

fn read_transition(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransitionRow> {
    Ok(TransitionRow {
        id: row.get(0)?,
        driver_id: row.get(1)?,
        zone_id: row.get(2)?,
        trip_id: row.get(3)?,
        leg: row.get(4)?,
        kind: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        at: row.get(8)?,
    })
}

impl TransitionRow {
    fn into_transition(self) -> Result<ZoneTransition, StoreError> {
        Ok(ZoneTransition {
            id: parse_id(self.id, TransitionId::new).map_err(corrupt)?,
            driver_id: self.driver_id,
            zone_id: parse_id(self.zone_id, ZoneId::new).map_err(corrupt)?,
            trip_id: self.trip_id,
            leg: decode_enum(&self.leg).map_err(corrupt)?,
            kind: decode_enum(&self.kind).map_err(corrupt)?,
            position: Coordinate::new(self.latitude, self.longitude),
            at: from_rfc3339(&self.at).map_err(corrupt)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use crate::zone_repo::ZoneRepo;
    use chrono::{Duration, TimeZone};
    use wp_core::types::{GeofenceZone, LegType, TransitionKind, ZoneShape};
    use wp_core::zones::ZoneRepository;

    fn seeded_zone(conn: &Connection) -> GeofenceZone {
        let zone = GeofenceZone {
            id: ZoneId::generate(),
            trip_id: "T1".to_string(),
            leg: LegType::Pickup,
            name: "ACME Warehouse".to_string(),
            center: Coordinate::new(41.88, -87.63),
            shape: ZoneShape::Circle {
                radius_meters: 200.0,
            },
            required_dwell_seconds: 300,
            created_at: Utc::now(),
        };
        ZoneRepo::new(conn).insert(&zone).unwrap();
        zone
    }

    fn sample(zone: &GeofenceZone, at: DateTime<Utc>, inside: bool) -> LocationSample {
        LocationSample {
            driver_id: "drv-7".to_string(),
            zone_id: zone.id.clone(),
            position: Coordinate::new(41.88, -87.63),
            accuracy_meters: Some(8.0),
            distance_meters: if inside { 10.0 } else { 900.0 },
            inside,
            at,
        }
    }

    #[test]
    fn samples_are_windowed_and_ordered_oldest_first() {
        let conn = with_test_db().unwrap();
        let zone = seeded_zone(&conn);
        let repo = LocationRepo::new(&conn);
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        for offset in [120, 0, 60, 600] {
            repo.insert_sample(&sample(&zone, t0 + Duration::seconds(offset), true))
                .unwrap();
        }

        let window = repo
            .samples("drv-7", &zone.id, t0, t0 + Duration::seconds(120))
            .unwrap();
        let offsets: Vec<i64> = window.iter().map(|s| (s.at - t0).num_seconds()).collect();
        assert_eq!(offsets, vec![0, 60, 120]);
        assert!(repo
            .samples("drv-8", &zone.id, t0, t0 + Duration::seconds(600))
            .unwrap()
            .is_empty());

        let last = repo
            .last_sample("drv-7", &zone.id, t0 + Duration::seconds(300))
            .unwrap()
            .unwrap();
        assert_eq!(last.at, t0 + Duration::seconds(120));
        assert_eq!(last.accuracy_meters, Some(8.0));
    }

    #[test]
    fn transitions_filter_by_kind_newest_first() {
        let conn = with_test_db().unwrap();
        let zone = seeded_zone(&conn);
        let repo = LocationRepo::new(&conn);
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        for (offset, kind) in [
            (0, TransitionKind::Enter),
            (300, TransitionKind::Exit),
            (600, TransitionKind::Enter),
        ] {
            repo.insert_transition(&ZoneTransition {
                id: TransitionId::generate(),
                driver_id: "drv-7".to_string(),
                zone_id: zone.id.clone(),
                trip_id: zone.trip_id.clone(),
                leg: zone.leg,
                kind,
                position: zone.center,
                at: t0 + Duration::seconds(offset),
            })
            .unwrap();
        }

        let enters = repo
            .transitions(&TransitionFilter {
                kind: Some(TransitionKind::Enter),
                ..TransitionFilter::default()
            })
            .unwrap();
        assert_eq!(enters.len(), 2);
        assert_eq!(enters[0].at, t0 + Duration::seconds(600));
        assert!(repo
            .transitions(&TransitionFilter {
                driver_id: Some("drv-8".to_string()),
                ..TransitionFilter::default()
            })
            .unwrap()
            .is_empty());
    }
}
