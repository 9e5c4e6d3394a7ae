//! SQLite-backed document store
//!
//! The store holds two tables:
//! - `documents`: one row per entity, domain fields as a JSON body
//! - `link_sets`: one row per reciprocal set member
//!
//! The store primary key is the canonical identifier string, so there is
//! no second representation to translate between.

pub(crate) mod documents;
pub(crate) mod link_sets;
pub(crate) mod schema;

pub use schema::SCHEMA_VERSION;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

use crate::core::error::StoreError;
use crate::core::identity::{EntityId, EntityKind};

impl ToSql for EntityId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for EntityId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Active / inactive document counts for one kind
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct KindCount {
    pub active: usize,
    pub inactive: usize,
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_entities: usize,
    pub by_kind: BTreeMap<EntityKind, KindCount>,
    pub link_rows: usize,
    pub db_size_bytes: u64,
}

/// The entity store backed by SQLite
pub struct EntityStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl EntityStore {
    /// Open or create a store at `path`
    ///
    /// `busy_timeout` is how long a write waits on another writer's lock
    /// before failing with a transient error.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.busy_timeout(busy_timeout)?;
        // WAL lets readers proceed while a writer holds the lock
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::init(&conn)?;

        tracing::debug!(path = %path.display(), "opened entity store");

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// A private store that lives as long as the value does
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Database file, if the store is not in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start a write transaction that takes the write lock up front
    pub(crate) fn begin(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Get store statistics
    pub fn statistics(&self) -> Result<StoreStats, StoreError> {
        let mut by_kind = BTreeMap::new();
        let mut total_entities = 0;
        for kind in EntityKind::all() {
            let total = documents::count(&self.conn, *kind, true)?;
            let active = documents::count(&self.conn, *kind, false)?;
            total_entities += total;
            by_kind.insert(
                *kind,
                KindCount {
                    active,
                    inactive: total - active,
                },
            );
        }

        let link_rows: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM link_sets", [], |row| row.get(0))?;

        let db_size_bytes = self
            .path
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(StoreStats {
            total_entities,
            by_kind,
            link_rows: link_rows as usize,
            db_size_bytes,
        })
    }
}
