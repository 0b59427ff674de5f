use crate::util::{corrupt, decode_enum, encode_enum, from_rfc3339, parse_id, storage, to_rfc3339};
use rusqlite::{Connection, OptionalExtension};
use wp_core::checkins::CheckInRepository;
use wp_core::error::StoreError;
use wp_core::types::{CheckInEvent, CheckInId, Coordinate, ZoneId};

const COLUMNS: &str = "id, idempotency_key, trip_id, leg, zone_id, driver_id, latitude, longitude, \
    accuracy_meters, distance_meters, radius_meters, is_override, override_reason, bucket, \
    recorded_at, created_at";

pub struct CheckInRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> CheckInRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn find(&self, clause: &str, value: &str) -> Result<Option<CheckInEvent>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM check_in_events WHERE {clause} = ?1");
        let row = self
            .conn
            .query_row(&sql, [value], read_row)
            .optional()
            .map_err(storage)?;
        row.map(CheckInRow::into_event).transpose()
    }
}

impl CheckInRepository for CheckInRepo<'_> {
    fn insert(&self, event: &CheckInEvent) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO check_in_events ({COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        );
        let params = rusqlite::params![
            event.id.as_str(),
            event.idempotency_key,
            event.trip_id,
            encode_enum(&event.leg).map_err(corrupt)?,
            event.zone_id.as_str(),
            event.driver_id,
            event.position.latitude,
            event.position.longitude,
            event.accuracy_meters,
            event.distance_meters,
            event.radius_meters,
            event.is_override,
            event.override_reason,
            event.bucket,
            to_rfc3339(&event.recorded_at),
            to_rfc3339(&event.created_at),
        ];
        self.conn.execute(&sql, params).map_err(storage)?;
        Ok(())
    }

    fn get(&self, id: &CheckInId) -> Result<Option<CheckInEvent>, StoreError> {
        self.find("id", id.as_str())
    }

    fn get_by_key(&self, idempotency_key: &str) -> Result<Option<CheckInEvent>, StoreError> {
        self.find("idempotency_key", idempotency_key)
    }

    fn list(&self, trip_id: Option<&str>) -> Result<Vec<CheckInEvent>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM check_in_events WHERE (?1 IS NULL OR trip_id = ?1) \
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map([trip_id], read_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter().map(CheckInRow::into_event).collect()
    }
}

struct CheckInRow {
    id: String,
    idempotency_key: String,
    trip_id: String,
    leg: String,
    zone_id: String,
    driver_id: Option<String>,
    latitude: f64,
    longitude: f64,
    accuracy_meters: Option<f64>,
    distance_meters: f64,
    radius_meters: f64,
    is_override: bool,
    override_reason: Option<String>,
    bucket: i64,
    recorded_at: String,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckInRow> {
    Ok(CheckInRow {
        id: row.get(0)?,
        idempotency_key: row.get(1)?,
        trip_id: row.get(2)?,
        leg: row.get(3)?,
        zone_id: row.get(4)?,
        driver_id: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        accuracy_meters: row.get(8)?,
        distance_meters: row.get(9)?,
        radius_meters: row.get(10)?,
        is_override: row.get(11)?,
        override_reason: row.get(12)?,
        bucket: row.get(13)?,
        recorded_at: row.get(14)?,
        created_at: row.get(15)?,
    })
}

impl CheckInRow {
    fn into_event(self) -> Result<CheckInEvent, StoreError> {
        Ok(CheckInEvent {
            id: parse_id(self.id, CheckInId::new).map_err(corrupt)?,
            idempotency_key: self.idempotency_key,
            trip_id: self.trip_id,
            leg: decode_enum(&self.leg).map_err(corrupt)?,
            zone_id: parse_id(self.zone_id, ZoneId::new).map_err(corrupt)?,
            driver_id: self.driver_id,
            position: Coordinate::new(self.latitude, self.longitude),
            accuracy_meters: self.accuracy_meters,
            distance_meters: self.distance_meters,
            radius_meters: self.radius_meters,
            is_override: self.is_override,
            override_reason: self.override_reason,
            bucket: self.bucket,
            recorded_at: from_rfc3339(&self.recorded_at).map_err(corrupt)?,
            created_at: from_rfc3339(&self.created_at).map_err(corrupt)?,
        })
    }
}
