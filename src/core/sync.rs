//! Bidirectional link synchronization
//!
//! Reciprocal sets are derived data: each one mirrors the owning reference
//! fields that point at its holder. Only the repository calls into this
//! module, always inside the same transaction as the primary write.

use std::collections::{BTreeSet, HashMap};

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use crate::core::error::{is_transient_sqlite_error, StoreError};
use crate::core::identity::{EntityId, EntityKind};
use crate::core::links::{LinkRegistry, ReferenceDecl};
use crate::core::store::documents::{self, StoredDoc};
use crate::core::store::link_sets::{self, LinkRow};

/// Result of a full reciprocal rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Rows added because an owning reference had no mirror
    pub added: usize,
    /// Rows removed because nothing references their holder any more
    pub removed: usize,
}

impl SyncStats {
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

fn link_failure(
    owner: &EntityId,
    target: &EntityId,
    field: &str,
    e: rusqlite::Error,
) -> StoreError {
    let transient = is_transient_sqlite_error(&e);
    tracing::warn!(%owner, %target, field, transient, error = %e, "reciprocal link sync failed");
    StoreError::LinkSyncFailure {
        owner: owner.to_string(),
        target: target.to_string(),
        field: field.to_string(),
        transient,
        reason: e.to_string(),
    }
}

/// Move `owner` from `old`'s reciprocal set to `new`'s
///
/// The pull always precedes the add. Both are set operations, so running
/// this twice with the same arguments leaves the same rows behind.
pub(crate) fn sync(
    conn: &Connection,
    owner: &EntityId,
    decl: &ReferenceDecl,
    new: Option<&EntityId>,
    old: Option<&EntityId>,
) -> Result<(), StoreError> {
    let Some(set) = decl.reciprocal else {
        return Ok(());
    };

    if let Some(old) = old {
        link_sets::pull(conn, old, set, owner).map_err(|e| link_failure(owner, old, set, e))?;
    }

    if let Some(new) = new {
        match documents::active_state(conn, new) {
            Ok(Some(true)) => {}
            Ok(_) => {
                tracing::warn!(%owner, target = %new, field = set, "link target is missing or inactive");
                return Err(StoreError::LinkSyncFailure {
                    owner: owner.to_string(),
                    target: new.to_string(),
                    field: set.to_string(),
                    reason: "target could not be loaded".to_string(),
                    transient: false,
                })
            }
            Err(e) => return Err(link_failure(owner, new, set, e)),
        }
        link_sets::add(conn, new, set, owner).map_err(|e| link_failure(owner, new, set, e))?;
    }

    tracing::trace!(%owner, field = decl.field, set, ?new, ?old, "synced reciprocal link");
    Ok(())
}

/// Remove `member` from every reciprocal set that lists it
pub(crate) fn detach(conn: &Connection, member: &EntityId) -> Result<usize, StoreError> {
    Ok(link_sets::pull_everywhere(conn, member)?)
}

/// Parse a stored reference value naming an entity of `target`
pub(crate) fn stored_target(value: Option<&Value>, target: EntityKind) -> Option<EntityId> {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<EntityId>().ok())
        .filter(|id| id.kind() == target)
}

/// Link rows implied by the references of every active entity
///
/// A row is expected whenever its holder exists, active or not: soft
/// deletion of a target leaves its sets in place for audit to see.
pub(crate) fn expected_links(
    conn: &Connection,
    registry: &LinkRegistry,
) -> Result<BTreeSet<LinkRow>, StoreError> {
    let mut by_kind: HashMap<EntityKind, Vec<StoredDoc>> = HashMap::new();
    let mut expected = BTreeSet::new();

    for decl in registry.references() {
        let Some(set) = decl.reciprocal else {
            continue;
        };
        if !by_kind.contains_key(&decl.owner) {
            by_kind.insert(decl.owner, documents::list(conn, decl.owner, false)?);
        }
        let docs = by_kind.get(&decl.owner).map(Vec::as_slice).unwrap_or(&[]);

        for doc in docs {
            let Some(target) = stored_target(doc.fields.get(decl.field), decl.target) else {
                continue;
            };
            if documents::active_state(conn, &target)?.is_some() {
                expected.insert(LinkRow {
                    owner: target,
                    field: set.to_string(),
                    member: doc.id,
                });
            }
        }
    }

    Ok(expected)
}

/// Rebuild every reciprocal set from the owning references
pub(crate) fn rebuild(conn: &Connection, registry: &LinkRegistry) -> Result<SyncStats, StoreError> {
    let expected = expected_links(conn, registry)?;
    let actual: BTreeSet<LinkRow> = link_sets::all(conn)?.into_iter().collect();

    let mut stats = SyncStats::default();
    for row in expected.difference(&actual) {
        if link_sets::add(conn, &row.owner, &row.field, &row.member)? {
            stats.added += 1;
        }
    }
    for row in actual.difference(&expected) {
        if link_sets::pull(conn, &row.owner, &row.field, &row.member)? {
            stats.removed += 1;
        }
    }

    Ok(stats)
}
