//! Reciprocal link set rows
//!
//! Each member of a set is its own row, so adding is an insert-if-absent
//! and pulling is a single delete. Concurrent writers touching the same set
//! never overwrite each other's members.

use std::collections::BTreeMap;

use rusqlite::{params, Connection};

use crate::core::identity::EntityId;

/// One `(owner, field, member)` row
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct LinkRow {
    pub owner: EntityId,
    pub field: String,
    pub member: EntityId,
}

/// Add `member` to `owner.field`; false if it was already present
pub(crate) fn add(
    conn: &Connection,
    owner: &EntityId,
    field: &str,
    member: &EntityId,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO link_sets (owner_id, field, member_id) VALUES (?1, ?2, ?3)",
        params![owner, field, member],
    )?;
    Ok(changed > 0)
}

/// Remove `member` from `owner.field`; false if it was not present
pub(crate) fn pull(
    conn: &Connection,
    owner: &EntityId,
    field: &str,
    member: &EntityId,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM link_sets WHERE owner_id = ?1 AND field = ?2 AND member_id = ?3",
        params![owner, field, member],
    )?;
    Ok(changed > 0)
}

/// Remove `member` from every set that lists it
pub(crate) fn pull_everywhere(conn: &Connection, member: &EntityId) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM link_sets WHERE member_id = ?1",
        params![member],
    )
}

/// Drop every set owned by `owner`
pub(crate) fn remove_owner(conn: &Connection, owner: &EntityId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM link_sets WHERE owner_id = ?1", params![owner])
}

/// All sets of one owner, members sorted
pub(crate) fn sets_of(
    conn: &Connection,
    owner: &EntityId,
) -> rusqlite::Result<BTreeMap<String, Vec<EntityId>>> {
    let mut stmt = conn.prepare(
        "SELECT field, member_id FROM link_sets WHERE owner_id = ?1 ORDER BY field, member_id",
    )?;
    let rows = stmt.query_map(params![owner], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, EntityId>(1)?))
    })?;

    let mut sets: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();
    for row in rows {
        let (field, member) = row?;
        sets.entry(field).or_default().push(member);
    }
    Ok(sets)
}

/// Members of one set, sorted
pub(crate) fn members(
    conn: &Connection,
    owner: &EntityId,
    field: &str,
) -> rusqlite::Result<Vec<EntityId>> {
    let mut stmt = conn.prepare(
        "SELECT member_id FROM link_sets WHERE owner_id = ?1 AND field = ?2 ORDER BY member_id",
    )?;
    let rows = stmt.query_map(params![owner, field], |row| row.get(0))?;
    rows.collect()
}

/// Every row in the store, sorted
pub(crate) fn all(conn: &Connection) -> rusqlite::Result<Vec<LinkRow>> {
    let mut stmt = conn.prepare(
        "SELECT owner_id, field, member_id FROM link_sets ORDER BY owner_id, field, member_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(LinkRow {
            owner: row.get(0)?,
            field: row.get(1)?,
            member: row.get(2)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityKind;
    use crate::core::store::schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init(&conn).unwrap();
        conn
    }

    #[test]
    fn test_add_has_set_semantics() {
        let conn = conn();
        let company = EntityId::new(EntityKind::Company);
        let res = EntityId::new(EntityKind::Resolution);

        assert!(add(&conn, &company, "resolutionIds", &res).unwrap());
        assert!(!add(&conn, &company, "resolutionIds", &res).unwrap());
        assert_eq!(members(&conn, &company, "resolutionIds").unwrap(), vec![res]);
    }

    #[test]
    fn test_pull_missing_member_is_noop() {
        let conn = conn();
        let company = EntityId::new(EntityKind::Company);
        let res = EntityId::new(EntityKind::Resolution);
        assert!(!pull(&conn, &company, "resolutionIds", &res).unwrap());
    }

    #[test]
    fn test_pull_everywhere_and_sets_of() {
        let conn = conn();
        let company = EntityId::new(EntityKind::Company);
        let parent = EntityId::new(EntityKind::Resolution);
        let vehicle = EntityId::new(EntityKind::Vehicle);
        add(&conn, &company, "vehicleIds", &vehicle).unwrap();
        add(&conn, &parent, "vehicleIds", &vehicle).unwrap();

        assert_eq!(sets_of(&conn, &company).unwrap()["vehicleIds"], vec![vehicle]);
        assert_eq!(pull_everywhere(&conn, &vehicle).unwrap(), 2);
        assert!(all(&conn).unwrap().is_empty());
    }
}
