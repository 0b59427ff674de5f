use crate::util::{
    corrupt, decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, parse_id, storage,
    to_rfc3339,
};
use rusqlite::{Connection, OptionalExtension};
use wp_core::error::StoreError;
use wp_core::types::{Coordinate, GeofenceZone, LegType, ZoneId};
use wp_core::zones::ZoneRepository;

const COLUMNS: &str =
    "id, trip_id, leg, name, center_lat, center_lon, shape_json, required_dwell_seconds, created_at";

pub struct ZoneRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ZoneRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ZoneRepository for ZoneRepo<'_> {
    fn insert(&self, zone: &GeofenceZone) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO zones ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)");
        let params = (
            zone.id.as_str(),
            zone.trip_id.as_str(),
            encode_enum(&zone.leg).map_err(corrupt)?,
            zone.name.as_str(),
            zone.center.latitude,
            zone.center.longitude,
            encode_json(&zone.shape).map_err(corrupt)?,
            zone.required_dwell_seconds,
            to_rfc3339(&zone.created_at),
        );
        self.conn.execute(&sql, params).map_err(storage)?;
        Ok(())
    }

    fn get(&self, id: &ZoneId) -> Result<Option<GeofenceZone>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM zones WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, [id.as_str()], read_row)
            .optional()
            .map_err(storage)?;
        row.map(ZoneRow::into_zone).transpose()
    }

    fn for_leg(&self, trip_id: &str, leg: LegType) -> Result<Option<GeofenceZone>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM zones WHERE trip_id = ?1 AND leg = ?2");
        let row = self
            .conn
            .query_row(&sql, (trip_id, leg.as_str()), read_row)
            .optional()
            .map_err(storage)?;
        row.map(ZoneRow::into_zone).transpose()
    }

    fn list(&self, trip_id: Option<&str>) -> Result<Vec<GeofenceZone>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM zones WHERE (?1 IS NULL OR trip_id = ?1) ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map([trip_id], read_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter().map(ZoneRow::into_zone).collect()
    }
}

struct ZoneRow {
    id: String,
    trip_id: String,
    leg: String,
    name: String,
    center_lat: f64,
    center_lon: f64,
    shape_json: String,
    required_dwell_seconds: u32,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ZoneRow> {
    Ok(ZoneRow {
        id: row.get(0)?,
        trip_id: row.get(1)?,
        leg: row.get(2)?,
        name: row.get(3)?,
        center_lat: row.get(4)?,
        center_lon: row.get(5)?,
        shape_json: row.get(6)?,
        required_dwell_seconds: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl ZoneRow {
    fn into_zone(self) -> Result<GeofenceZone, StoreError> {
        Ok(GeofenceZone {
            id: parse_id(self.id, ZoneId::new).map_err(corrupt)?,
            trip_id: self.trip_id,
            leg: decode_enum(&self.leg).map_err(corrupt)?,
            name: self.name,
            center: Coordinate::new(self.center_lat, self.center_lon),
            shape: decode_json(&self.shape_json).map_err(corrupt)?,
            required_dwell_seconds: self.required_dwell_seconds,
            created_at: from_rfc3339(&self.created_at).map_err(corrupt)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use chrono::Utc;
    use wp_core::types::ZoneShape;

    fn zone(trip_id: &str, leg: LegType) -> GeofenceZone {
        GeofenceZone {
            id: ZoneId::generate(),
            trip_id: trip_id.to_string(),
            leg,
            name: "ACME Warehouse".to_string(),
            center: Coordinate::new(41.88, -87.63),
            shape: ZoneShape::Circle {
                radius_meters: 200.0,
            },
            required_dwell_seconds: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn zones_are_unique_per_trip_leg() {
        let conn = with_test_db().unwrap();
        let repo = ZoneRepo::new(&conn);
        let pickup = zone("T1", LegType::Pickup);
        repo.insert(&pickup).unwrap();
        repo.insert(&zone("T1", LegType::Delivery)).unwrap();

        let err = repo.insert(&zone("T1", LegType::Pickup)).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));

        let loaded = repo.for_leg("T1", LegType::Pickup).unwrap().unwrap();
        assert_eq!(loaded.id, pickup.id);
        assert_eq!(loaded.shape, pickup.shape);
        assert_eq!(repo.list(Some("T1")).unwrap().len(), 2);
        assert!(repo.list(Some("T2")).unwrap().is_empty());
    }
}
