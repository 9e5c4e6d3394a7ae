//! Reference integrity checks
//!
//! Write-time checks run inside the write transaction before anything is
//! stored. The audit is a read-only sweep over everything already stored.

use std::collections::BTreeSet;
use std::fmt;

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use crate::core::entity::Fields;
use crate::core::error::StoreError;
use crate::core::identity::{self, EntityId, EntityKind};
use crate::core::links::{LinkRegistry, ReferenceDecl};
use crate::core::store::{documents, link_sets};
use crate::core::sync;

/// Which write a field map belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Create,
    Update,
}

/// A reference touched by a write: its declaration and resolved target
pub(crate) type TouchedReference<'r> = (&'r ReferenceDecl, Option<EntityId>);

fn raw_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve `value` to an active entity of kind `target`
///
/// Anything that cannot name such an entity, malformed text included, is
/// reported as `ReferenceNotFound` carrying the value exactly as given.
pub(crate) fn check_reference(
    conn: &Connection,
    field: &str,
    value: &Value,
    target: EntityKind,
) -> Result<EntityId, StoreError> {
    let not_found = || StoreError::ReferenceNotFound {
        field: field.to_string(),
        target_kind: target,
        value: raw_value(value),
    };

    let id = value
        .as_str()
        .and_then(|s| identity::normalize(s).ok())
        .filter(|id| id.kind() == target)
        .ok_or_else(not_found)?;

    match documents::active_state(conn, &id)? {
        Some(true) => Ok(id),
        _ => Err(not_found()),
    }
}

/// Check a create payload or update patch against the registry
///
/// Reference values are rewritten to canonical form in place. Returns the
/// references the write touches, with `None` for a cleared optional one.
pub(crate) fn check_fields<'r>(
    conn: &Connection,
    registry: &'r LinkRegistry,
    kind: EntityKind,
    fields: &mut Fields,
    mode: WriteMode,
) -> Result<Vec<TouchedReference<'r>>, StoreError> {
    if let Some(field) = fields.keys().find(|f| registry.is_read_only(kind, f)) {
        return Err(StoreError::ReadOnlyField {
            field: field.clone(),
        });
    }

    let mut touched = Vec::new();
    for decl in registry.references_of(kind) {
        let missing = || StoreError::MissingReference {
            kind,
            field: decl.field.to_string(),
        };

        match fields.get(decl.field) {
            None if mode == WriteMode::Create && decl.required => return Err(missing()),
            None => {}
            Some(Value::Null) if decl.required => return Err(missing()),
            Some(Value::Null) => touched.push((decl, None)),
            Some(value) => {
                let id = check_reference(conn, decl.field, value, decl.target)?;
                fields.insert(decl.field.to_string(), Value::String(id.to_string()));
                touched.push((decl, Some(id)));
            }
        }
    }

    Ok(touched)
}

/// Category of an audit finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ViolationKind {
    /// Required reference absent
    MissingReference,
    /// Reference names no stored entity
    DanglingReference,
    /// Reference names a soft-deleted entity
    InactiveTarget,
    /// Reference is malformed or names an entity of another kind
    WrongKind,
    /// An owning reference has no row in the target's set
    MissingReciprocal,
    /// A set lists an entity that no longer references the holder
    StaleReciprocal,
    /// Stored lineage type disagrees with the parent pointer
    LineageMismatch,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::MissingReference => "missing-reference",
            ViolationKind::DanglingReference => "dangling-reference",
            ViolationKind::InactiveTarget => "inactive-target",
            ViolationKind::WrongKind => "wrong-kind",
            ViolationKind::MissingReciprocal => "missing-reciprocal",
            ViolationKind::StaleReciprocal => "stale-reciprocal",
            ViolationKind::LineageMismatch => "lineage-mismatch",
        };
        write!(f, "{}", s)
    }
}

/// One audit finding
///
/// For reciprocal findings the entity is the set holder, the field is the
/// set, and the value is the member in question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityViolation {
    pub kind: ViolationKind,
    pub entity_type: EntityKind,
    pub entity_id: EntityId,
    pub field: String,
    pub dangling_value: Option<String>,
}

impl IntegrityViolation {
    fn new(
        kind: ViolationKind,
        entity_id: EntityId,
        field: &str,
        dangling_value: Option<String>,
    ) -> Self {
        Self {
            kind,
            entity_type: entity_id.kind(),
            entity_id,
            field: field.to_string(),
            dangling_value,
        }
    }
}

/// Sweep every active entity and every link row; never writes
pub(crate) fn audit_all(
    conn: &Connection,
    registry: &LinkRegistry,
) -> Result<Vec<IntegrityViolation>, StoreError> {
    let mut violations = Vec::new();

    for kind in EntityKind::all() {
        let decls: Vec<&ReferenceDecl> = registry.references_of(*kind).collect();
        let lineage = registry.lineage_of(*kind);
        if decls.is_empty() && lineage.is_none() {
            continue;
        }

        for doc in documents::list(conn, *kind, false)? {
            for decl in &decls {
                if let Some(v) = audit_reference(conn, doc.id, decl, doc.fields.get(decl.field))? {
                    violations.push(v);
                }
            }

            if let Some(lineage) = lineage {
                if lineage.is_inconsistent(&doc.fields) {
                    violations.push(IntegrityViolation::new(
                        ViolationKind::LineageMismatch,
                        doc.id,
                        lineage.type_field,
                        doc.fields.get(lineage.type_field).map(raw_value),
                    ));
                }
            }
        }
    }

    let expected = sync::expected_links(conn, registry)?;
    let actual: BTreeSet<_> = link_sets::all(conn)?.into_iter().collect();
    for row in expected.difference(&actual) {
        violations.push(IntegrityViolation::new(
            ViolationKind::MissingReciprocal,
            row.owner,
            &row.field,
            Some(row.member.to_string()),
        ));
    }
    for row in actual.difference(&expected) {
        violations.push(IntegrityViolation::new(
            ViolationKind::StaleReciprocal,
            row.owner,
            &row.field,
            Some(row.member.to_string()),
        ));
    }

    Ok(violations)
}

fn audit_reference(
    conn: &Connection,
    owner: EntityId,
    decl: &ReferenceDecl,
    value: Option<&Value>,
) -> Result<Option<IntegrityViolation>, StoreError> {
    let value = match value {
        None | Some(Value::Null) if decl.required => {
            return Ok(Some(IntegrityViolation::new(
                ViolationKind::MissingReference,
                owner,
                decl.field,
                None,
            )))
        }
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    let Some(target) = sync::stored_target(Some(value), decl.target) else {
        return Ok(Some(IntegrityViolation::new(
            ViolationKind::WrongKind,
            owner,
            decl.field,
            Some(raw_value(value)),
        )));
    };

    let kind = match documents::active_state(conn, &target)? {
        Some(true) => return Ok(None),
        Some(false) if decl.orphanable => return Ok(None),
        Some(false) => ViolationKind::InactiveTarget,
        None => ViolationKind::DanglingReference,
    };

    Ok(Some(IntegrityViolation::new(
        kind,
        owner,
        decl.field,
        Some(target.to_string()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::schema;
    use chrono::Utc;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init(&conn).unwrap();
        conn
    }

    fn insert(conn: &Connection, kind: EntityKind, fields: Value) -> EntityId {
        let id = EntityId::new(kind);
        let fields: Fields = fields.as_object().cloned().unwrap();
        documents::insert(conn, &id, &Utc::now(), &fields).unwrap();
        id
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_check_reference_accepts_padded_canonical_id() {
        let conn = conn();
        let company = insert(&conn, EntityKind::Company, json!({}));
        let padded = json!(format!("  {} ", company));
        let id = check_reference(&conn, "companyId", &padded, EntityKind::Company).unwrap();
        assert_eq!(id, company);
    }

    #[test]
    fn test_check_reference_rejects_garbage_with_raw_value() {
        let conn = conn();
        let err = check_reference(
            &conn,
            "companyId",
            &json!("nonexistent-id"),
            EntityKind::Company,
        )
        .unwrap_err();
        match err {
            StoreError::ReferenceNotFound { field, value, .. } => {
                assert_eq!(field, "companyId");
                assert_eq!(value, "nonexistent-id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_reference_rejects_wrong_kind_and_inactive() {
        let conn = conn();
        let vehicle = insert(&conn, EntityKind::Vehicle, json!({}));
        let company = insert(&conn, EntityKind::Company, json!({}));
        documents::deactivate(&conn, &company, &Utc::now()).unwrap();

        for value in [vehicle.to_string(), company.to_string()] {
            assert!(matches!(
                check_reference(&conn, "companyId", &json!(value), EntityKind::Company),
                Err(StoreError::ReferenceNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_check_fields_create_requires_references() {
        let conn = conn();
        let registry = LinkRegistry::transport();
        let mut payload = fields(json!({ "number": "R-1" }));
        let err = check_fields(
            &conn,
            &registry,
            EntityKind::Resolution,
            &mut payload,
            WriteMode::Create,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference { .. }));
    }

    #[test]
    fn test_check_fields_rejects_read_only() {
        let conn = conn();
        let registry = LinkRegistry::transport();
        for field in ["isActive", "resolutionIds"] {
            let mut patch = fields(json!({ field: [] }));
            let err = check_fields(
                &conn,
                &registry,
                EntityKind::Company,
                &mut patch,
                WriteMode::Update,
            )
            .unwrap_err();
            assert!(matches!(err, StoreError::ReadOnlyField { .. }));
        }
    }

    #[test]
    fn test_check_fields_canonicalizes_and_reports_touched() {
        let conn = conn();
        let registry = LinkRegistry::transport();
        let company = insert(&conn, EntityKind::Company, json!({}));
        let mut patch = fields(json!({
            "companyId": format!("{}\n", company),
            "resolutionId": null,
        }));

        let touched = check_fields(
            &conn,
            &registry,
            EntityKind::Vehicle,
            &mut patch,
            WriteMode::Update,
        )
        .unwrap();
        assert_eq!(patch["companyId"], json!(company.to_string()));
        assert_eq!(touched.len(), 2);
        assert!(touched.iter().any(|(d, t)| d.field == "resolutionId" && t.is_none()));
    }

    #[test]
    fn test_audit_reports_each_violation_kind() {
        let conn = conn();
        let registry = LinkRegistry::transport();
        let gone = insert(&conn, EntityKind::Company, json!({}));
        documents::deactivate(&conn, &gone, &Utc::now()).unwrap();

        let inactive = insert(
            &conn,
            EntityKind::Vehicle,
            json!({ "companyId": gone.to_string() }),
        );
        let dangling = insert(
            &conn,
            EntityKind::Route,
            json!({
                "companyId": EntityId::new(EntityKind::Company).to_string(),
                "resolutionId": "junk",
            }),
        );
        // Driver references are orphanable
        insert(
            &conn,
            EntityKind::Driver,
            json!({ "companyId": gone.to_string() }),
        );

        let violations = audit_all(&conn, &registry).unwrap();
        let find = |id: EntityId, field: &str| {
            violations
                .iter()
                .find(|v| v.entity_id == id && v.field == field)
                .map(|v| v.kind)
        };

        assert_eq!(find(inactive, "companyId"), Some(ViolationKind::InactiveTarget));
        assert_eq!(find(dangling, "companyId"), Some(ViolationKind::DanglingReference));
        assert_eq!(find(dangling, "resolutionId"), Some(ViolationKind::WrongKind));
        // The vehicle's row in the inactive company's set was never written
        assert_eq!(find(gone, "vehicleIds"), Some(ViolationKind::MissingReciprocal));
        assert!(violations
            .iter()
            .all(|v| v.entity_type != EntityKind::Driver));
    }

    #[test]
    fn test_audit_reports_lineage_and_stale_rows() {
        let conn = conn();
        let registry = LinkRegistry::transport();
        let company = insert(&conn, EntityKind::Company, json!({}));
        let res = insert(
            &conn,
            EntityKind::Resolution,
            json!({ "companyId": company.to_string(), "resolutionType": "derived" }),
        );
        link_sets::add(&conn, &company, "resolutionIds", &res).unwrap();
        link_sets::add(&conn, &company, "routeIds", &EntityId::new(EntityKind::Route)).unwrap();

        let kinds: Vec<ViolationKind> = audit_all(&conn, &registry)
            .unwrap()
            .into_iter()
            .map(|v| v.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ViolationKind::LineageMismatch, ViolationKind::StaleReciprocal]
        );
    }
}
