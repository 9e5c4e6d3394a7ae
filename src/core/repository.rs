//! Entity repository
//!
//! The only write path into the store. Every create, update and soft delete
//! runs as one immediate transaction:
//!
//! 1. reference and read-only checks
//! 2. lineage derivation and domain validation
//! 3. the document write
//! 4. reciprocal link synchronization
//!
//! Any failure rolls the whole transaction back, so no write is ever
//! partially visible. Transient failures re-run the entire sequence.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::entity::{Entity, Fields, Record};
use crate::core::error::StoreError;
use crate::core::identity::{self, EntityId, EntityKind};
use crate::core::integrity::{self, IntegrityViolation, WriteMode};
use crate::core::lineage;
use crate::core::links::LinkRegistry;
use crate::core::query::Query;
use crate::core::retry::RetryConfig;
use crate::core::store::{documents, link_sets, EntityStore, StoreStats};
use crate::core::sync::{self, SyncStats};

/// Domain-level check run inside every write transaction
///
/// Receives the stored fields (`None` on create) and the fields about to be
/// written, so state changes can be checked against what is committed.
pub type Validator = fn(EntityKind, Option<&Fields>, &Fields) -> Result<(), StoreError>;

/// Entity repository over a store and a set of declared relationships
pub struct Repository {
    store: EntityStore,
    registry: LinkRegistry,
    retry: RetryConfig,
    validator: Option<Validator>,
}

impl Repository {
    pub fn new(store: EntityStore, registry: LinkRegistry) -> Self {
        Self {
            store,
            registry,
            retry: RetryConfig::default(),
            validator: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Normalize `raw` and require it to name an entity of `kind`
    fn resolve(&self, kind: EntityKind, raw: &str) -> Result<EntityId, StoreError> {
        let id = identity::normalize(raw)?;
        if id.kind() != kind {
            return Err(StoreError::NotFound {
                kind,
                id: raw.to_string(),
            });
        }
        Ok(id)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create an entity of `kind` from domain fields
    pub fn create(&mut self, kind: EntityKind, fields: Fields) -> Result<Entity, StoreError> {
        let retry = self.retry.clone();
        let entity = retry.run("create", || self.try_create(kind, fields.clone()))?;
        debug!(id = %entity.id, "created entity");
        Ok(entity)
    }

    fn try_create(&mut self, kind: EntityKind, mut fields: Fields) -> Result<Entity, StoreError> {
        let id = identity::generate(kind);
        let now = Utc::now();
        let registry = &self.registry;
        let validator = self.validator;

        let tx = self.store.begin()?;

        let touched =
            integrity::check_fields(&tx, registry, kind, &mut fields, WriteMode::Create)?;
        fields.retain(|_, v| !v.is_null());

        if let Some(decl) = registry.lineage_of(kind) {
            let declared = fields.get(decl.type_field).cloned();
            lineage::derive(&tx, decl, &id, &mut fields, declared.as_ref(), true)?;
        }
        if let Some(validate) = validator {
            validate(kind, None, &fields)?;
        }

        documents::insert(&tx, &id, &now, &fields)?;
        for (decl, target) in &touched {
            sync::sync(&tx, &id, decl, target.as_ref(), None)?;
        }

        let entity = load_entity(&tx, registry, &id)?.ok_or_else(|| StoreError::NotFound {
            kind,
            id: id.to_string(),
        })?;
        tx.commit()?;
        Ok(entity)
    }

    /// Apply a patch to an active entity; a null value clears the field
    pub fn update(
        &mut self,
        kind: EntityKind,
        id: &str,
        patch: Fields,
    ) -> Result<Entity, StoreError> {
        let id = self.resolve(kind, id)?;
        let retry = self.retry.clone();
        let entity = retry.run("update", || self.try_update(kind, &id, patch.clone()))?;
        debug!(%id, "updated entity");
        Ok(entity)
    }

    fn try_update(
        &mut self,
        kind: EntityKind,
        id: &EntityId,
        mut patch: Fields,
    ) -> Result<Entity, StoreError> {
        let now = Utc::now();
        let registry = &self.registry;
        let validator = self.validator;

        let tx = self.store.begin()?;

        let current = documents::load(&tx, id)?
            .filter(|doc| doc.is_active)
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })?;

        let touched =
            integrity::check_fields(&tx, registry, kind, &mut patch, WriteMode::Update)?;

        let mut merged = current.fields.clone();
        for (field, value) in &patch {
            if value.is_null() {
                merged.remove(field);
            } else {
                merged.insert(field.clone(), value.clone());
            }
        }

        if let Some(decl) = registry.lineage_of(kind) {
            let parent_changed = current.fields.get(decl.parent_field)
                != merged.get(decl.parent_field);
            lineage::derive(
                &tx,
                decl,
                id,
                &mut merged,
                patch.get(decl.type_field),
                parent_changed,
            )?;
        }
        if let Some(validate) = validator {
            validate(kind, Some(&current.fields), &merged)?;
        }

        documents::write_body(&tx, id, &merged, &now)?;

        // Only links whose target actually changed are touched
        for (decl, new) in &touched {
            let old = sync::stored_target(current.fields.get(decl.field), decl.target);
            if old != *new {
                sync::sync(&tx, id, decl, new.as_ref(), old.as_ref())?;
            }
        }

        let entity = load_entity(&tx, registry, id)?.ok_or_else(|| StoreError::NotFound {
            kind,
            id: id.to_string(),
        })?;
        tx.commit()?;
        Ok(entity)
    }

    /// Mark an entity inactive and drop it from every reciprocal set
    ///
    /// Entities referencing it are left alone; the audit reports them.
    pub fn soft_delete(&mut self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let id = self.resolve(kind, id)?;
        let retry = self.retry.clone();
        let pulled = retry.run("soft_delete", || self.try_soft_delete(kind, &id))?;
        debug!(%id, pulled, "soft-deleted entity");
        Ok(())
    }

    fn try_soft_delete(&mut self, kind: EntityKind, id: &EntityId) -> Result<usize, StoreError> {
        let now = Utc::now();
        let tx = self.store.begin()?;

        if !documents::deactivate(&tx, id, &now)? {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        let pulled = sync::detach(&tx, id)?;

        tx.commit()?;
        Ok(pulled)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up an entity, active or not
    ///
    /// Malformed identifiers are an error, never a silent miss. An id of
    /// another kind finds nothing.
    pub fn find_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>, StoreError> {
        let id = identity::normalize(id)?;
        if id.kind() != kind {
            return Ok(None);
        }
        load_entity(self.store.conn(), &self.registry, &id)
    }

    /// Look up an active entity
    pub fn get(&self, kind: EntityKind, id: &str) -> Result<Entity, StoreError> {
        self.find_by_id(kind, id)?
            .filter(|e| e.is_active)
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    /// Entities of `kind` passing `query`, ordered by id
    pub fn find_by_query(&self, kind: EntityKind, query: &Query) -> Result<Vec<Entity>, StoreError> {
        let query = self.normalize_query(kind, query)?;
        let conn = self.store.conn();

        let mut results = Vec::new();
        for doc in documents::list(conn, kind, query.include_inactive)? {
            if query.limit.is_some_and(|n| results.len() >= n) {
                break;
            }
            let links = load_links(conn, &self.registry, &doc.id)?;
            let entity = Entity {
                id: doc.id,
                is_active: doc.is_active,
                created_at: doc.created_at,
                updated_at: doc.updated_at,
                fields: doc.fields,
                links,
            };
            if query.matches(&entity) {
                results.push(entity);
            }
        }
        Ok(results)
    }

    /// Identifier filter values go through the same policy as writes
    fn normalize_query(&self, kind: EntityKind, query: &Query) -> Result<Query, StoreError> {
        let mut query = query.clone();
        for (field, value) in query.filters.iter_mut() {
            let is_id_field = self.registry.reference(kind, field).is_some()
                || self.registry.is_reciprocal_field(kind, field);
            let canonical = match value {
                Value::String(s) if is_id_field => Some(identity::normalize(s)?.to_string()),
                _ => None,
            };
            if let Some(canonical) = canonical {
                *value = Value::String(canonical);
            }
        }
        Ok(query)
    }

    /// Resolve a reference value to an active entity of `target`
    pub fn check_reference(
        &self,
        field: &str,
        value: &str,
        target: EntityKind,
    ) -> Result<EntityId, StoreError> {
        integrity::check_reference(
            self.store.conn(),
            field,
            &Value::String(value.to_string()),
            target,
        )
    }

    /// Read-only sweep of every stored reference and link set
    pub fn audit_all(&self) -> Result<Vec<IntegrityViolation>, StoreError> {
        let violations = integrity::audit_all(self.store.conn(), &self.registry)?;
        debug!(violations = violations.len(), "audit complete");
        Ok(violations)
    }

    /// Members of one reciprocal set of an entity
    pub fn referrers(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
    ) -> Result<Vec<EntityId>, StoreError> {
        if !self.registry.is_reciprocal_field(kind, field) {
            return Err(StoreError::InvalidDocument(format!(
                "{} has no link set '{}'",
                kind, field
            )));
        }
        let entity = self.get(kind, id)?;
        Ok(entity.link_set(field).to_vec())
    }

    pub fn count(&self, kind: EntityKind, include_inactive: bool) -> Result<usize, StoreError> {
        documents::count(self.store.conn(), kind, include_inactive)
    }

    pub fn statistics(&self) -> Result<StoreStats, StoreError> {
        self.store.statistics()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Rebuild every reciprocal set from the owning references
    pub fn resync_links(&mut self) -> Result<SyncStats, StoreError> {
        let retry = self.retry.clone();
        let stats = retry.run("resync", || {
            let tx = self.store.begin()?;
            let stats = sync::rebuild(&tx, &self.registry)?;
            tx.commit()?;
            Ok(stats)
        })?;
        info!(added = stats.added, removed = stats.removed, "resynced links");
        Ok(stats)
    }

    /// Physically remove soft-deleted entities of `kind`
    pub fn purge_inactive(&mut self, kind: EntityKind) -> Result<usize, StoreError> {
        let retry = self.retry.clone();
        let purged = retry.run("purge", || {
            let tx = self.store.begin()?;
            let ids = documents::purge_inactive(&tx, kind)?;
            for id in &ids {
                link_sets::remove_owner(&tx, id)?;
                sync::detach(&tx, id)?;
            }
            tx.commit()?;
            Ok(ids.len())
        })?;
        info!(%kind, purged, "purged inactive entities");
        Ok(purged)
    }

    // =========================================================================
    // Typed records
    // =========================================================================

    /// Validate and create a typed record
    pub fn create_record<T: Record>(&mut self, record: &T) -> Result<Entity, StoreError> {
        record.validate().map_err(StoreError::InvalidDocument)?;
        self.create(T::KIND, record.to_fields()?)
    }

    /// Load an active entity as a typed record
    pub fn get_record<T: Record>(&self, id: &str) -> Result<T, StoreError> {
        self.get(T::KIND, id)?.decode()
    }
}

fn load_links(
    conn: &Connection,
    registry: &LinkRegistry,
    id: &EntityId,
) -> Result<BTreeMap<String, Vec<EntityId>>, StoreError> {
    let mut stored = link_sets::sets_of(conn, id)?;
    Ok(registry
        .reciprocal_fields(id.kind())
        .into_iter()
        .map(|field| (field.to_string(), stored.remove(field).unwrap_or_default()))
        .collect())
}

fn load_entity(
    conn: &Connection,
    registry: &LinkRegistry,
    id: &EntityId,
) -> Result<Option<Entity>, StoreError> {
    let Some(doc) = documents::load(conn, id)? else {
        return Ok(None);
    };
    Ok(Some(Entity {
        id: doc.id,
        is_active: doc.is_active,
        created_at: doc.created_at,
        updated_at: doc.updated_at,
        fields: doc.fields,
        links: load_links(conn, registry, id)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo() -> Repository {
        Repository::new(
            EntityStore::open_in_memory().unwrap(),
            LinkRegistry::transport(),
        )
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_sets_reserved_fields() {
        let mut repo = repo();
        let company = repo
            .create(EntityKind::Company, fields(json!({ "legalName": "Sur" })))
            .unwrap();
        assert!(company.is_active);
        assert_eq!(company.created_at, company.updated_at);
        assert_eq!(company.kind(), EntityKind::Company);
        assert!(company.link_set("resolutionIds").is_empty());
        assert_eq!(company.links.len(), 4);
    }

    #[test]
    fn test_find_by_id_malformed_is_error() {
        let repo = repo();
        let err = repo.find_by_id(EntityKind::Company, "co-123").unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifierFormat { .. }));
    }

    #[test]
    fn test_find_by_id_other_kind_is_none() {
        let mut repo = repo();
        let company = repo.create(EntityKind::Company, Fields::new()).unwrap();
        let found = repo
            .find_by_id(EntityKind::Vehicle, &company.id.to_string())
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_update_inactive_is_not_found() {
        let mut repo = repo();
        let company = repo.create(EntityKind::Company, Fields::new()).unwrap();
        let id = company.id.to_string();
        repo.soft_delete(EntityKind::Company, &id).unwrap();

        let err = repo
            .update(EntityKind::Company, &id, fields(json!({ "legalName": "X" })))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(repo.find_by_id(EntityKind::Company, &id).unwrap().is_some());
    }

    #[test]
    fn test_update_null_clears_field() {
        let mut repo = repo();
        let company = repo
            .create(EntityKind::Company, fields(json!({ "phone": "123" })))
            .unwrap();
        let updated = repo
            .update(
                EntityKind::Company,
                &company.id.to_string(),
                fields(json!({ "phone": null })),
            )
            .unwrap();
        assert!(updated.field("phone").is_none());
        assert!(updated.updated_at >= company.updated_at);
    }

    #[test]
    fn test_validator_rejects_write_atomically() {
        fn reject_vehicles(
            kind: EntityKind,
            _: Option<&Fields>,
            _: &Fields,
        ) -> Result<(), StoreError> {
            match kind {
                EntityKind::Vehicle => Err(StoreError::InvalidDocument("no vehicles today".into())),
                _ => Ok(()),
            }
        }

        let mut repo = repo().with_validator(reject_vehicles);
        let company = repo.create(EntityKind::Company, Fields::new()).unwrap();
        let err = repo
            .create(
                EntityKind::Vehicle,
                fields(json!({ "companyId": company.id.to_string() })),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
        assert_eq!(repo.count(EntityKind::Vehicle, true).unwrap(), 0);
        let company = repo.get(EntityKind::Company, &company.id.to_string()).unwrap();
        assert!(company.link_set("vehicleIds").is_empty());
    }

    #[test]
    fn test_query_normalizes_reference_filters() {
        let mut repo = repo();
        let company = repo.create(EntityKind::Company, Fields::new()).unwrap();
        repo.create(
            EntityKind::Driver,
            fields(json!({ "companyId": company.id.to_string() })),
        )
        .unwrap();
        repo.create(EntityKind::Driver, Fields::new()).unwrap();

        let padded = format!(" {} ", company.id);
        let query = Query::new().where_eq("companyId", padded);
        assert_eq!(repo.find_by_query(EntityKind::Driver, &query).unwrap().len(), 1);

        let bad = Query::new().where_eq("companyId", "nope");
        assert!(matches!(
            repo.find_by_query(EntityKind::Driver, &bad),
            Err(StoreError::InvalidIdentifierFormat { .. })
        ));

        let limited = Query::new().limit(1);
        assert_eq!(repo.find_by_query(EntityKind::Driver, &limited).unwrap().len(), 1);
    }

    #[test]
    fn test_referrers_requires_declared_set() {
        let mut repo = repo();
        let company = repo.create(EntityKind::Company, Fields::new()).unwrap();
        let id = company.id.to_string();
        assert!(repo
            .referrers(EntityKind::Company, &id, "driverIds")
            .unwrap()
            .is_empty());
        assert!(repo.referrers(EntityKind::Company, &id, "legalName").is_err());
    }

    #[test]
    fn test_purge_removes_rows_and_links() {
        let mut repo = repo();
        let company = repo.create(EntityKind::Company, Fields::new()).unwrap();
        let driver = repo
            .create(
                EntityKind::Driver,
                fields(json!({ "companyId": company.id.to_string() })),
            )
            .unwrap();
        repo.soft_delete(EntityKind::Company, &company.id.to_string())
            .unwrap();

        assert_eq!(repo.purge_inactive(EntityKind::Company).unwrap(), 1);
        assert!(repo
            .find_by_id(EntityKind::Company, &company.id.to_string())
            .unwrap()
            .is_none());
        assert_eq!(repo.statistics().unwrap().link_rows, 0);
        // Orphaned driver is tolerated only while its target exists; now it dangles
        let violations = repo.audit_all().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].entity_id, driver.id);
    }
}
