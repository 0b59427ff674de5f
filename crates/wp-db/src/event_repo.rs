use crate::util::{
    corrupt, decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, storage, to_rfc3339,
};
use rusqlite::Connection;
use ulid::Ulid;
use wp_core::error::StoreError;
use wp_core::events::EventRepository;
use wp_events::types::EventRecord;

const MAX_LIMIT: u32 = 1000;

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl EventRepository for EventRepo<'_> {
    fn append(&self, mut event: EventRecord) -> Result<EventRecord, StoreError> {
        event.seq = next_seq(self.conn)?;
        event.id = format!("evt_{}", Ulid::new());
        let sql = "INSERT INTO events (id, seq, at, correlation_id, source, topic, body_json) \
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
        let params = (
            event.id.as_str(),
            event.seq,
            to_rfc3339(&event.at),
            event.correlation_id.as_deref(),
            encode_enum(&event.source).map_err(corrupt)?,
            event.topic.as_str(),
            encode_json(&event.body).map_err(corrupt)?,
        );
        self.conn.execute(sql, params).map_err(storage)?;
        Ok(event)
    }

    fn list(&self, after: Option<i64>, limit: Option<u32>) -> Result<Vec<EventRecord>, StoreError> {
        let limit = limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, seq, at, correlation_id, source, topic, body_json FROM events \
                 WHERE (?1 IS NULL OR seq > ?1) ORDER BY seq ASC LIMIT ?2",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map((after, limit), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        rows.into_iter()
            .map(|(id, seq, at, correlation_id, source, topic, body)| {
                Ok(EventRecord {
                    id,
                    seq,
                    at: from_rfc3339(&at).map_err(corrupt)?,
                    correlation_id,
                    source: decode_enum(&source).map_err(corrupt)?,
                    topic,
                    body: decode_json(&body).map_err(corrupt)?,
                })
            })
            .collect()
    }
}

fn next_seq(conn: &Connection) -> Result<i64, StoreError> {
    let seq: i64 = conn
        .query_row("SELECT COALESCE(MAX(seq), 0) FROM events", [], |row| row.get(0))
        .map_err(storage)?;
    Ok(seq + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use chrono::Utc;
    use serde_json::json;
    use wp_events::types::EventSource;

    fn record(topic: &str) -> EventRecord {
        EventRecord {
            id: String::new(),
            seq: 0,
            at: Utc::now(),
            correlation_id: None,
            source: EventSource::Driver,
            topic: topic.to_string(),
            body: json!({ "type": "check_in_created", "payload": {} }),
        }
    }

    #[test]
    fn append_assigns_increasing_seq() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let first = repo.append(record("system")).unwrap();
        let second = repo.append(record("shipping-office")).unwrap();
        assert_eq!((first.seq, second.seq), (1, 2));
        assert!(first.id.starts_with("evt_"));

        let after_first = repo.list(Some(1), None).unwrap();
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].topic, "shipping-office");
        assert_eq!(after_first[0].kind(), Some("check_in_created"));
    }
}
