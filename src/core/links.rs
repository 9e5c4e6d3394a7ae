//! Declared references and their reciprocal link sets
//!
//! Every relationship the store maintains is declared here once: the owning
//! reference field, the kind it points at, and the set on the target that
//! mirrors it. The repository, the integrity checker and the synchronizer
//! all read from the same registry.

use thiserror::Error;

use crate::core::identity::EntityKind;
use crate::core::lineage::LineageDecl;

/// Fields every entity carries that only the repository may write
pub const RESERVED_FIELDS: &[&str] = &["id", "isActive", "createdAt", "updatedAt"];

/// A reference field on `owner` pointing at an entity of kind `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDecl {
    pub owner: EntityKind,
    pub field: &'static str,
    pub target: EntityKind,
    /// Must be present on create and may never be cleared
    pub required: bool,
    /// Audit tolerates this reference pointing at a soft-deleted target
    pub orphanable: bool,
    /// Set field on the target that lists the owners' ids
    pub reciprocal: Option<&'static str>,
}

impl ReferenceDecl {
    /// A required, non-orphanable reference without a reciprocal set
    pub fn new(owner: EntityKind, field: &'static str, target: EntityKind) -> Self {
        Self {
            owner,
            field,
            target,
            required: true,
            orphanable: false,
            reciprocal: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn orphanable(mut self) -> Self {
        self.orphanable = true;
        self
    }

    pub fn reciprocal(mut self, field: &'static str) -> Self {
        self.reciprocal = Some(field);
        self
    }
}

/// Registration conflicts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0}.{1} is already declared")]
    DuplicateReference(EntityKind, &'static str),

    #[error("{0}.{1} is a reserved field")]
    ReservedField(EntityKind, &'static str),

    #[error("reciprocal set {0}.{1} is already fed by another reference")]
    ReciprocalConflict(EntityKind, &'static str),

    #[error("{0}.{1} is both a reference field and a reciprocal set")]
    FieldClash(EntityKind, &'static str),

    #[error("lineage on {0} needs {0}.{1} declared as a self-reference")]
    LineageWithoutReference(EntityKind, &'static str),
}

/// All declared relationships
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    references: Vec<ReferenceDecl>,
    lineage: Vec<LineageDecl>,
}

impl LinkRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationships of the transport registry
    pub fn transport() -> Self {
        use EntityKind::*;

        Self {
            references: vec![
                ReferenceDecl::new(Resolution, "companyId", Company).reciprocal("resolutionIds"),
                ReferenceDecl::new(Resolution, "parentResolutionId", Resolution)
                    .optional()
                    .reciprocal("childResolutionIds"),
                ReferenceDecl::new(Vehicle, "companyId", Company).reciprocal("vehicleIds"),
                ReferenceDecl::new(Vehicle, "resolutionId", Resolution)
                    .optional()
                    .reciprocal("vehicleIds"),
                ReferenceDecl::new(Route, "companyId", Company).reciprocal("routeIds"),
                ReferenceDecl::new(Route, "resolutionId", Resolution).reciprocal("routeIds"),
                ReferenceDecl::new(Driver, "companyId", Company)
                    .optional()
                    .orphanable()
                    .reciprocal("driverIds"),
            ],
            lineage: vec![LineageDecl::resolution()],
        }
    }

    /// Declare a reference
    pub fn register(&mut self, decl: ReferenceDecl) -> Result<(), RegistryError> {
        if RESERVED_FIELDS.contains(&decl.field) {
            return Err(RegistryError::ReservedField(decl.owner, decl.field));
        }
        if self.reference(decl.owner, decl.field).is_some() {
            return Err(RegistryError::DuplicateReference(decl.owner, decl.field));
        }
        if self.is_reciprocal_field(decl.owner, decl.field) {
            return Err(RegistryError::FieldClash(decl.owner, decl.field));
        }
        if let Some(set) = decl.reciprocal {
            if RESERVED_FIELDS.contains(&set) {
                return Err(RegistryError::ReservedField(decl.target, set));
            }
            if self.reference(decl.target, set).is_some() {
                return Err(RegistryError::FieldClash(decl.target, set));
            }
            // Two references of the same owner kind feeding one set would be indistinguishable
            let conflict = self.references.iter().any(|d| {
                d.target == decl.target && d.reciprocal == Some(set) && d.owner == decl.owner
            });
            if conflict {
                return Err(RegistryError::ReciprocalConflict(decl.target, set));
            }
        }
        self.references.push(decl);
        Ok(())
    }

    /// Declare a lineage rule; its parent field must be a registered self-reference
    pub fn register_lineage(&mut self, decl: LineageDecl) -> Result<(), RegistryError> {
        match self.reference(decl.kind, decl.parent_field) {
            Some(r) if r.target == decl.kind => {
                self.lineage.push(decl);
                Ok(())
            }
            _ => Err(RegistryError::LineageWithoutReference(
                decl.kind,
                decl.parent_field,
            )),
        }
    }

    /// Every declared reference
    pub fn references(&self) -> &[ReferenceDecl] {
        &self.references
    }

    /// References owned by entities of `kind`
    pub fn references_of(&self, kind: EntityKind) -> impl Iterator<Item = &ReferenceDecl> {
        self.references.iter().filter(move |d| d.owner == kind)
    }

    /// Look up one declared reference
    pub fn reference(&self, kind: EntityKind, field: &str) -> Option<&ReferenceDecl> {
        self.references
            .iter()
            .find(|d| d.owner == kind && d.field == field)
    }

    /// Reciprocal set fields carried by entities of `kind`, deduplicated
    pub fn reciprocal_fields(&self, kind: EntityKind) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = self
            .references
            .iter()
            .filter(|d| d.target == kind)
            .filter_map(|d| d.reciprocal)
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    /// Is `field` a reciprocal set on entities of `kind`
    pub fn is_reciprocal_field(&self, kind: EntityKind, field: &str) -> bool {
        self.references
            .iter()
            .any(|d| d.target == kind && d.reciprocal == Some(field))
    }

    /// The reference feeding `target_kind.set` from entities of `owner_kind`
    pub fn feeding_reference(
        &self,
        target_kind: EntityKind,
        set: &str,
        owner_kind: EntityKind,
    ) -> Option<&ReferenceDecl> {
        self.references.iter().find(|d| {
            d.target == target_kind && d.reciprocal == Some(set) && d.owner == owner_kind
        })
    }

    /// Fields callers may not write on entities of `kind`
    pub fn is_read_only(&self, kind: EntityKind, field: &str) -> bool {
        RESERVED_FIELDS.contains(&field) || self.is_reciprocal_field(kind, field)
    }

    /// Lineage rule for `kind`, if any
    pub fn lineage_of(&self, kind: EntityKind) -> Option<&LineageDecl> {
        self.lineage.iter().find(|l| l.kind == kind)
    }

    /// Every declared lineage rule
    pub fn lineages(&self) -> &[LineageDecl] {
        &self.lineage
    }
}
