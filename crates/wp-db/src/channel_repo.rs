use crate::util::{corrupt, decode_enum, encode_enum, from_rfc3339, parse_id, storage, to_rfc3339};
use rusqlite::{Connection, OptionalExtension};
use wp_core::channels::ChannelRepository;
use wp_core::error::StoreError;
use wp_core::types::{Channel, ChannelId, LegType, NotificationId};

const COLUMNS: &str = "id, external_id, trip_id, leg, po_number, driver_id, name, description, \
    source_notification_id, created_by, created_at";

pub struct ChannelRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ChannelRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ChannelRepository for ChannelRepo<'_> {
    fn insert(&self, channel: &Channel) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO channels ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        );
        let params = rusqlite::params![
            channel.id.as_str(),
            channel.external_id,
            channel.trip_id,
            encode_enum(&channel.leg).map_err(corrupt)?,
            channel.po_number,
            channel.driver_id,
            channel.name,
            channel.description,
            channel.source_notification_id.as_ref().map(NotificationId::as_str),
            channel.created_by,
            to_rfc3339(&channel.created_at),
        ];
        self.conn.execute(&sql, params).map_err(storage)?;
        Ok(())
    }

    fn get(&self, id: &ChannelId) -> Result<Option<Channel>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM channels WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, [id.as_str()], read_row)
            .optional()
            .map_err(storage)?;
        row.map(ChannelRow::into_channel).transpose()
    }

    fn for_leg(&self, trip_id: &str, leg: LegType) -> Result<Option<Channel>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM channels WHERE trip_id = ?1 AND leg = ?2");
        let row = self
            .conn
            .query_row(&sql, (trip_id, leg.as_str()), read_row)
            .optional()
            .map_err(storage)?;
        row.map(ChannelRow::into_channel).transpose()
    }

    fn list(&self, trip_id: Option<&str>) -> Result<Vec<Channel>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM channels WHERE (?1 IS NULL OR trip_id = ?1) \
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map([trip_id], read_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter().map(ChannelRow::into_channel).collect()
    }
}

struct ChannelRow {
    id: String,
    external_id: String,
    trip_id: String,
    leg: String,
    po_number: Option<String>,
    driver_id: Option<String>,
    name: String,
    description: String,
    source_notification_id: Option<String>,
    created_by: String,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        external_id: row.get(1)?,
        trip_id: row.get(2)?,
        leg: row.get(3)?,
        po_number: row.get(4)?,
        driver_id: row.get(5)?,
        name: row.get(6)?,
        description: row.get(7)?,
        source_notification_id: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl ChannelRow {
    fn into_channel(self) -> Result<Channel, StoreError> {
        Ok(Channel {
            id: parse_id(self.id, ChannelId::new).map_err(corrupt)?,
            external_id: self.external_id,
            trip_id: self.trip_id,
            leg: decode_enum(&self.leg).map_err(corrupt)?,
            po_number: self.po_number,
            driver_id: self.driver_id,
            name: self.name,
            description: self.description,
            source_notification_id: self
                .source_notification_id
                .map(|id| parse_id(id, NotificationId::new))
                .transpose()
                .map_err(corrupt)?,
            created_by: self.created_by,
            created_at: from_rfc3339(&self.created_at).map_err(corrupt)?,
        })
    }
}
