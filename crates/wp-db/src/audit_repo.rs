use crate::util::{
    corrupt, decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, parse_id, storage,
    to_rfc3339,
};
use rusqlite::Connection;
use wp_core::audit::AuditRepository;
use wp_core::error::StoreError;
use wp_core::types::{AuditEntry, AuditFilter, AuditId, SubjectRef};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

pub struct AuditRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> AuditRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl AuditRepository for AuditRepo<'_> {
    fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let sql = "INSERT INTO audit_entries (id, actor, action, subject_kind, subject_id, at, detail_json) \
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
        let params = (
            entry.id.as_str(),
            entry.actor.as_str(),
            encode_enum(&entry.action).map_err(corrupt)?,
            entry.subject.kind.as_str(),
            entry.subject.id.as_str(),
            to_rfc3339(&entry.at),
            encode_json(&entry.detail).map_err(corrupt)?,
        );
        self.conn.execute(sql, params).map_err(storage)?;
        Ok(())
    }

    fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let action = filter
            .action
            .as_ref()
            .map(encode_enum)
            .transpose()
            .map_err(corrupt)?;
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, actor, action, subject_kind, subject_id, at, detail_json \
                 FROM audit_entries \
                 WHERE (?1 IS NULL OR subject_id = ?1) AND (?2 IS NULL OR action = ?2) \
                 ORDER BY at DESC, id DESC LIMIT ?3",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map((filter.subject.as_deref(), action, limit), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        rows.into_iter()
            .map(|(id, actor, action, kind, subject_id, at, detail)| {
                Ok(AuditEntry {
                    id: parse_id(id, AuditId::new).map_err(corrupt)?,
                    actor,
                    action: decode_enum(&action).map_err(corrupt)?,
                    subject: SubjectRef::new(decode_enum(&kind).map_err(corrupt)?, subject_id),
                    at: from_rfc3339(&at).map_err(corrupt)?,
                    detail: decode_json(&detail).map_err(corrupt)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use wp_core::types::{AuditAction, SubjectKind};

    fn entry(action: AuditAction, subject: &str, minutes_ago: i64) -> AuditEntry {
        AuditEntry {
            id: AuditId::generate(),
            actor: "dispatcher-a".to_string(),
            action,
            subject: SubjectRef::new(SubjectKind::Channel, subject),
            at: Utc::now() - Duration::minutes(minutes_ago),
            detail: json!({ "trip_id": "T1" }),
        }
    }

    #[test]
    fn list_is_newest_first_and_filterable() {
        let conn = with_test_db().unwrap();
        let repo = AuditRepo::new(&conn);
        repo.append(&entry(AuditAction::ChannelCreated, "chn_a", 10)).unwrap();
        repo.append(&entry(AuditAction::NotificationRetired, "ntf_b", 5)).unwrap();
        repo.append(&entry(AuditAction::ChannelCreated, "chn_c", 1)).unwrap();

        let all = repo.list(&AuditFilter::default()).unwrap();
        let subjects: Vec<_> = all.iter().map(|entry| entry.subject.id.as_str()).collect();
        assert_eq!(subjects, ["chn_c", "ntf_b", "chn_a"]);

        let created = repo
            .list(&AuditFilter {
                action: Some(AuditAction::ChannelCreated),
                limit: Some(1),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].subject.id, "chn_c");

        let one = repo
            .list(&AuditFilter {
                subject: Some("ntf_b".to_string()),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(one[0].action, AuditAction::NotificationRetired);
        assert_eq!(one[0].detail, json!({ "trip_id": "T1" }));
    }
}
