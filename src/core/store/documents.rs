//! Document row access
//!
//! Plain row operations over any connection or open transaction. No
//! integrity rules live here; callers in the repository decide when each
//! operation is allowed.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::entity::Fields;
use crate::core::error::StoreError;
use crate::core::identity::{EntityId, EntityKind};

/// A document row as stored, without its link sets
#[derive(Debug, Clone)]
pub(crate) struct StoredDoc {
    pub id: EntityId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fields: Fields,
}

type RawRow = (EntityId, bool, String, String, String);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

impl StoredDoc {
    fn from_raw((id, is_active, created, updated, body): RawRow) -> Result<Self, StoreError> {
        Ok(Self {
            id,
            is_active,
            created_at: parse_timestamp(&created)?,
            updated_at: parse_timestamp(&updated)?,
            fields: serde_json::from_str(&body)?,
        })
    }
}

/// Render a timestamp the way it is stored
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidDocument(format!("bad timestamp '{}': {}", s, e)))
}

/// Insert a new active document
pub(crate) fn insert(
    conn: &Connection,
    id: &EntityId,
    now: &DateTime<Utc>,
    fields: &Fields,
) -> Result<(), StoreError> {
    let ts = format_timestamp(now);
    conn.execute(
        "INSERT INTO documents (id, kind, is_active, created_at, updated_at, body)
         VALUES (?1, ?2, 1, ?3, ?3, ?4)",
        params![id, id.kind().as_str(), ts, serde_json::to_string(fields)?],
    )?;
    Ok(())
}

/// Load a document by id, active or not
pub(crate) fn load(conn: &Connection, id: &EntityId) -> Result<Option<StoredDoc>, StoreError> {
    let raw = conn
        .query_row(
            "SELECT id, is_active, created_at, updated_at, body FROM documents WHERE id = ?1",
            params![id],
            raw_row,
        )
        .optional()?;
    raw.map(StoredDoc::from_raw).transpose()
}

/// `Some(is_active)` if the document exists
pub(crate) fn active_state(conn: &Connection, id: &EntityId) -> rusqlite::Result<Option<bool>> {
    conn.query_row(
        "SELECT is_active FROM documents WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
}

/// Replace the domain fields of a document
pub(crate) fn write_body(
    conn: &Connection,
    id: &EntityId,
    fields: &Fields,
    now: &DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE documents SET body = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, serde_json::to_string(fields)?, format_timestamp(now)],
    )?;
    Ok(())
}

/// Flip `is_active` off; returns false if the document was not active
pub(crate) fn deactivate(
    conn: &Connection,
    id: &EntityId,
    now: &DateTime<Utc>,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE documents SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        params![id, format_timestamp(now)],
    )?;
    Ok(changed > 0)
}

/// All documents of a kind, ordered by id
pub(crate) fn list(
    conn: &Connection,
    kind: EntityKind,
    include_inactive: bool,
) -> Result<Vec<StoredDoc>, StoreError> {
    let sql = if include_inactive {
        "SELECT id, is_active, created_at, updated_at, body FROM documents
         WHERE kind = ?1 ORDER BY id"
    } else {
        "SELECT id, is_active, created_at, updated_at, body FROM documents
         WHERE kind = ?1 AND is_active = 1 ORDER BY id"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![kind.as_str()], raw_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(StoredDoc::from_raw(row?)?);
    }
    Ok(docs)
}

/// Count documents of a kind
pub(crate) fn count(
    conn: &Connection,
    kind: EntityKind,
    include_inactive: bool,
) -> Result<usize, StoreError> {
    let sql = if include_inactive {
        "SELECT COUNT(*) FROM documents WHERE kind = ?1"
    } else {
        "SELECT COUNT(*) FROM documents WHERE kind = ?1 AND is_active = 1"
    };
    let n: i64 = conn.query_row(sql, params![kind.as_str()], |row| row.get(0))?;
    Ok(n as usize)
}

/// Physically delete the inactive documents of a kind, returning their ids
pub(crate) fn purge_inactive(
    conn: &Connection,
    kind: EntityKind,
) -> Result<Vec<EntityId>, StoreError> {
    let ids = {
        let mut stmt =
            conn.prepare("SELECT id FROM documents WHERE kind = ?1 AND is_active = 0 ORDER BY id")?;
        let rows = stmt.query_map(params![kind.as_str()], |row| row.get::<_, EntityId>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    conn.execute(
        "DELETE FROM documents WHERE kind = ?1 AND is_active = 0",
        params![kind.as_str()],
    )?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::schema;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init(&conn).unwrap();
        conn
    }

    fn body(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_and_load() {
        let conn = conn();
        let id = EntityId::new(EntityKind::Company);
        let now = Utc::now();
        insert(&conn, &id, &now, &body(json!({ "legalName": "Sur SAC" }))).unwrap();

        let doc = load(&conn, &id).unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert!(doc.is_active);
        assert_eq!(doc.fields["legalName"], json!("Sur SAC"));
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn test_load_missing_is_none() {
        let conn = conn();
        assert!(load(&conn, &EntityId::new(EntityKind::Route)).unwrap().is_none());
        assert!(active_state(&conn, &EntityId::new(EntityKind::Route))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_deactivate_only_once() {
        let conn = conn();
        let id = EntityId::new(EntityKind::Vehicle);
        let now = Utc::now();
        insert(&conn, &id, &now, &Fields::new()).unwrap();

        assert!(deactivate(&conn, &id, &now).unwrap());
        assert!(!deactivate(&conn, &id, &now).unwrap());
        assert_eq!(active_state(&conn, &id).unwrap(), Some(false));
    }

    #[test]
    fn test_list_filters_kind_and_activity() {
        let conn = conn();
        let now = Utc::now();
        let a = EntityId::new(EntityKind::Company);
        let b = EntityId::new(EntityKind::Company);
        let v = EntityId::new(EntityKind::Vehicle);
        for id in [&a, &b, &v] {
            insert(&conn, id, &now, &Fields::new()).unwrap();
        }
        deactivate(&conn, &b, &now).unwrap();

        assert_eq!(list(&conn, EntityKind::Company, false).unwrap().len(), 1);
        assert_eq!(list(&conn, EntityKind::Company, true).unwrap().len(), 2);
        assert_eq!(count(&conn, EntityKind::Vehicle, false).unwrap(), 1);
    }

    #[test]
    fn test_purge_removes_only_inactive() {
        let conn = conn();
        let now = Utc::now();
        let keep = EntityId::new(EntityKind::Driver);
        let drop = EntityId::new(EntityKind::Driver);
        insert(&conn, &keep, &now, &Fields::new()).unwrap();
        insert(&conn, &drop, &now, &Fields::new()).unwrap();
        deactivate(&conn, &drop, &now).unwrap();

        assert_eq!(purge_inactive(&conn, EntityKind::Driver).unwrap(), vec![drop]);
        assert!(load(&conn, &drop).unwrap().is_none());
        assert!(load(&conn, &keep).unwrap().is_some());
    }
}
