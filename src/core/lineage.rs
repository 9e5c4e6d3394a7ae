//! Derived lineage type for self-referencing kinds
//!
//! A resolution is `root` exactly when it has no parent and `derived`
//! exactly when it has one. The type is computed from the parent pointer
//! on every write rather than trusted from the caller.

use std::collections::HashSet;

use rusqlite::Connection;
use serde_json::Value;

use crate::core::entity::Fields;
use crate::core::error::StoreError;
use crate::core::identity::{EntityId, EntityKind};
use crate::core::store::documents;

/// A parent pointer plus the type field derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageDecl {
    pub kind: EntityKind,
    pub parent_field: &'static str,
    pub type_field: &'static str,
    pub root_value: &'static str,
    pub derived_value: &'static str,
}

impl LineageDecl {
    /// Resolution lineage: `parentResolutionId` drives `resolutionType`
    pub fn resolution() -> Self {
        Self {
            kind: EntityKind::Resolution,
            parent_field: "parentResolutionId",
            type_field: "resolutionType",
            root_value: "root",
            derived_value: "derived",
        }
    }

    /// Type implied by the presence of a parent pointer
    pub fn expected_type(&self, fields: &Fields) -> &'static str {
        match fields.get(self.parent_field) {
            None | Some(Value::Null) => self.root_value,
            Some(_) => self.derived_value,
        }
    }

    /// Stored type disagrees with the parent pointer
    pub fn is_inconsistent(&self, fields: &Fields) -> bool {
        fields.get(self.type_field).and_then(Value::as_str) != Some(self.expected_type(fields))
    }
}

/// Set the type field on `merged` from its parent pointer
///
/// `declared` is the type value the caller wrote in this request, if any; it
/// must agree with the derivation. When the parent changed, the new chain
/// is walked to make sure it never reaches `id` again.
pub(crate) fn derive(
    conn: &Connection,
    decl: &LineageDecl,
    id: &EntityId,
    merged: &mut Fields,
    declared: Option<&Value>,
    parent_changed: bool,
) -> Result<(), StoreError> {
    let expected = decl.expected_type(merged);

    if let Some(value) = declared.filter(|v| !v.is_null()) {
        if value.as_str() != Some(expected) {
            let declared = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            return Err(StoreError::LineageMismatch {
                declared,
                expected: expected.to_string(),
            });
        }
    }

    if parent_changed {
        let parent = merged
            .get(decl.parent_field)
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<EntityId>().ok());
        if let Some(parent) = parent {
            check_cycle(conn, decl, id, parent)?;
        }
    }

    merged.insert(decl.type_field.to_string(), Value::String(expected.to_string()));
    Ok(())
}

fn check_cycle(
    conn: &Connection,
    decl: &LineageDecl,
    id: &EntityId,
    parent: EntityId,
) -> Result<(), StoreError> {
    let mut seen = HashSet::new();
    let mut cursor = Some(parent);

    while let Some(current) = cursor {
        if current == *id {
            return Err(StoreError::LineageCycle { id: id.to_string() });
        }
        // Pre-existing loops above us are audit material, not ours to fail on
        if !seen.insert(current) {
            break;
        }
        cursor = documents::load(conn, &current)?.and_then(|doc| {
            doc.fields
                .get(decl.parent_field)
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_expected_type_follows_parent() {
        let decl = LineageDecl::resolution();
        assert_eq!(decl.expected_type(&fields(json!({}))), "root");
        assert_eq!(
            decl.expected_type(&fields(json!({ "parentResolutionId": null }))),
            "root"
        );
        assert_eq!(
            decl.expected_type(&fields(json!({ "parentResolutionId": "RES-X" }))),
            "derived"
        );
    }

    #[test]
    fn test_inconsistency_detection() {
        let decl = LineageDecl::resolution();
        assert!(decl.is_inconsistent(&fields(json!({ "resolutionType": "derived" }))));
        assert!(decl.is_inconsistent(&fields(json!({}))));
        assert!(!decl.is_inconsistent(&fields(json!({ "resolutionType": "root" }))));
    }

    #[test]
    fn test_derive_sets_type_and_rejects_contradiction() {
        let conn = Connection::open_in_memory().unwrap();
        let decl = LineageDecl::resolution();
        let id = EntityId::new(EntityKind::Resolution);

        let mut merged = fields(json!({ "number": "R-001" }));
        derive(&conn, &decl, &id, &mut merged, None, false).unwrap();
        assert_eq!(merged["resolutionType"], json!("root"));

        let declared = json!("derived");
        let err = derive(&conn, &decl, &id, &mut merged, Some(&declared), false).unwrap_err();
        assert!(matches!(err, StoreError::LineageMismatch { .. }));
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let conn = Connection::open_in_memory().unwrap();
        crate::core::store::schema::init(&conn).unwrap();
        let decl = LineageDecl::resolution();
        let id = EntityId::new(EntityKind::Resolution);

        let mut merged = fields(json!({ "parentResolutionId": id.to_string() }));
        let err = derive(&conn, &decl, &id, &mut merged, None, true).unwrap_err();
        assert!(matches!(err, StoreError::LineageCycle { .. }));
    }
}
