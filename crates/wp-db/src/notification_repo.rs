use crate::util::{
    corrupt, decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, like_pattern,
    parse_id, storage, to_rfc3339,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use wp_core::error::StoreError;
use wp_core::notifications::{NotificationQuery, NotificationRepository};
use wp_core::types::{
    ChannelId, CheckInId, Notification, NotificationId, ReadStatus, RecipientRead,
};

const COLUMNS: &str = "n.id, n.check_in_id, n.trip_id, n.leg, n.title, n.message, n.trip_json, \
    n.location_json, n.check_in_json, n.recipient_groups_json, n.channel_id, n.retired_at, \
    n.created_at";

pub struct NotificationRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> NotificationRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn find(&self, clause: &str, value: &str) -> Result<Option<Notification>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM notifications n WHERE {clause} = ?1");
        let row = self
            .conn
            .query_row(&sql, [value], read_row)
            .optional()
            .map_err(storage)?;
        row.map(|row| self.hydrate(row)).transpose()
    }

    fn hydrate(&self, row: NotificationRow) -> Result<Notification, StoreError> {
        let read_by = self.reads(&row.id)?;
        row.into_notification(read_by)
    }

    fn reads(&self, id: &str) -> Result<Vec<RecipientRead>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT recipient_group, read_at FROM notification_reads \
                 WHERE notification_id = ?1 ORDER BY read_at ASC",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map([id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter()
            .map(|(recipient_group, read_at)| {
                Ok(RecipientRead {
                    recipient_group,
                    read_at: from_rfc3339(&read_at).map_err(corrupt)?,
                })
            })
            .collect()
    }
}

impl NotificationRepository for NotificationRepo<'_> {
    fn insert(&self, notification: &Notification) -> Result<(), StoreError> {
        let sql = "INSERT INTO notifications (id, check_in_id, trip_id, leg, title, message, \
                   trip_json, location_json, check_in_json, recipient_groups_json, search_text, \
                   channel_id, retired_at, created_at) \
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";
        let params = rusqlite::params![
            notification.id.as_str(),
            notification.check_in_id.as_str(),
            notification.trip_id,
            encode_enum(&notification.leg).map_err(corrupt)?,
            notification.title,
            notification.message,
            encode_json(&notification.trip).map_err(corrupt)?,
            encode_json(&notification.location).map_err(corrupt)?,
            encode_json(&notification.check_in).map_err(corrupt)?,
            encode_json(&notification.recipient_groups).map_err(corrupt)?,
            search_text(notification),
            notification.channel_id.as_ref().map(ChannelId::as_str),
            notification.retired_at.as_ref().map(to_rfc3339),
            to_rfc3339(&notification.created_at),
        ];
        self.conn.execute(sql, params).map_err(storage)?;

        let mut recipients = self
            .conn
            .prepare(
                "INSERT OR IGNORE INTO notification_recipients (notification_id, recipient_group) \
                 VALUES (?1, ?2)",
            )
            .map_err(storage)?;
        for group in &notification.recipient_groups {
            recipients
                .execute((notification.id.as_str(), group.as_str()))
                .map_err(storage)?;
        }
        Ok(())
    }

    fn get(&self, id: &NotificationId) -> Result<Option<Notification>, StoreError> {
        self.find("n.id", id.as_str())
    }

    fn for_check_in(&self, check_in_id: &CheckInId) -> Result<Option<Notification>, StoreError> {
        self.find("n.check_in_id", check_in_id.as_str())
    }

    fn list(&self, query: &NotificationQuery) -> Result<Vec<Notification>, StoreError> {
        let status = match query.status {
            ReadStatus::All => "1 = 1",
            ReadStatus::Read => "rd.notification_id IS NOT NULL",
            ReadStatus::Unread => "rd.notification_id IS NULL AND n.retired_at IS NULL",
            ReadStatus::Actionable => "n.retired_at IS NULL",
        };
        let sql = format!(
            "SELECT {COLUMNS} FROM notifications n \
             JOIN notification_recipients r \
               ON r.notification_id = n.id AND r.recipient_group = ?1 \
             LEFT JOIN notification_reads rd \
               ON rd.notification_id = n.id AND rd.recipient_group = ?1 \
             WHERE (?2 IS NULL OR n.leg = ?2) \
               AND (?3 IS NULL OR n.created_at >= ?3) \
               AND (?4 IS NULL OR n.created_at <= ?4) \
               AND (?5 IS NULL OR n.search_text LIKE ?5 ESCAPE '\\') \
               AND {status} \
             ORDER BY n.created_at DESC, n.id DESC"
        );
        let params = rusqlite::params![
            query.recipient_group,
            query.leg.map(|leg| leg.as_str()),
            query.created_after.as_ref().map(to_rfc3339),
            query.created_before.as_ref().map(to_rfc3339),
            query.search.as_deref().map(like_pattern),
        ];
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(params, read_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    fn mark_read(
        &self,
        id: &NotificationId,
        recipient_group: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO notification_reads (notification_id, recipient_group, read_at) \
                 VALUES (?1, ?2, ?3)",
                (id.as_str(), recipient_group, to_rfc3339(&at)),
            )
            .map_err(storage)?;
        Ok(changed > 0)
    }

    fn retire(
        &self,
        id: &NotificationId,
        channel_id: Option<&ChannelId>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE notifications SET retired_at = ?2, channel_id = COALESCE(?3, channel_id) \
                 WHERE id = ?1 AND retired_at IS NULL",
                (id.as_str(), to_rfc3339(&at), channel_id.map(ChannelId::as_str)),
            )
            .map_err(storage)?;
        Ok(changed > 0)
    }

    fn stranded(&self) -> Result<Vec<(NotificationId, ChannelId)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT n.id, c.id FROM notifications n \
                 JOIN channels c ON c.trip_id = n.trip_id AND c.leg = n.leg \
                 WHERE n.retired_at IS NULL \
                 ORDER BY n.created_at ASC",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;
        rows.into_iter()
            .map(|(notification_id, channel_id)| {
                Ok((
                    parse_id(notification_id, NotificationId::new).map_err(corrupt)?,
                    parse_id(channel_id, ChannelId::new).map_err(corrupt)?,
                ))
            })
            .collect()
    }
}

fn search_text(notification: &Notification) -> String {
    [
        notification.trip.trip_number.as_str(),
        notification.trip.driver_name.as_str(),
        notification.trip.vehicle_number.as_str(),
        notification.trip.po_number.as_str(),
        notification.location.name.as_str(),
    ]
    .join("\n")
    .to_lowercase()
}

struct NotificationRow {
    id: String,
    check_in_id: String,
    trip_id: String,
    leg: String,
    title: String,
    message: String,
    trip_json: String,
    location_json: String,
    check_in_json: String,
    recipient_groups_json: String,
    channel_id: Option<String>,
    retired_at: Option<String>,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        check_in_id: row.get(1)?,
        trip_id: row.get(2)?,
        leg: row.get(3)?,
        title: row.get(4)?,
        message: row.get(5)?,
        trip_json: row.get(6)?,
        location_json: row.get(7)?,
        check_in_json: row.get(8)?,
        recipient_groups_json: row.get(9)?,
        channel_id: row.get(10)?,
        retired_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

impl NotificationRow {
    fn into_notification(self, read_by: Vec<RecipientRead>) -> Result<Notification, StoreError> {
        Ok(Notification {
            id: parse_id(self.id, NotificationId::new).map_err(corrupt)?,
            check_in_id: parse_id(self.check_in_id, CheckInId::new).map_err(corrupt)?,
            trip_id: self.trip_id,
            leg: decode_enum(&self.leg).map_err(corrupt)?,
            title: self.title,
            message: self.message,
            trip: decode_json(&self.trip_json).map_err(corrupt)?,
            location: decode_json(&self.location_json).map_err(corrupt)?,
            check_in: decode_json(&self.check_in_json).map_err(corrupt)?,
            recipient_groups: decode_json(&self.recipient_groups_json).map_err(corrupt)?,
            read_by,
            channel_id: self
                .channel_id
                .map(|id| parse_id(id, ChannelId::new))
                .transpose()
                .map_err(corrupt)?,
            retired_at: self
                .retired_at
                .as_deref()
                .map(from_rfc3339)
                .transpose()
                .map_err(corrupt)?,
            created_at: from_rfc3339(&self.created_at).map_err(corrupt)?,
        })
    }
}
