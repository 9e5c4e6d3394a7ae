//! Database schema initialization

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::StoreError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Create tables if missing and verify the schema version
///
/// A stored version other than [`SCHEMA_VERSION`] is an error; the
/// database is never reset.
pub(crate) fn init(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- One row per entity; domain fields live in the JSON body
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            body TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents(kind, is_active);

        -- Reciprocal link sets: one row per member, so add and pull are
        -- single-row atomic operations
        CREATE TABLE IF NOT EXISTS link_sets (
            owner_id TEXT NOT NULL,
            field TEXT NOT NULL,
            member_id TEXT NOT NULL,
            PRIMARY KEY (owner_id, field, member_id)
        );
        CREATE INDEX IF NOT EXISTS idx_link_sets_member ON link_sets(member_id);
        "#,
    )?;

    let found: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match found {
        None => {
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        }
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(v) => Err(StoreError::SchemaVersion {
            found: v,
            expected: SCHEMA_VERSION,
        }),
    }
}
