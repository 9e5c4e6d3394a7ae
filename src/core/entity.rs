//! Stored entity documents and the typed record trait

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::core::error::StoreError;
use crate::core::identity::{EntityId, EntityKind};

/// Domain fields of a document, keyed by camelCase field name
pub type Fields = serde_json::Map<String, Value>;

/// A persisted entity as seen by callers
///
/// `links` holds the reciprocal sets declared for the entity's kind. They
/// are materialized from the store on every read and are never written
/// through this struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(flatten)]
    pub links: BTreeMap<String, Vec<EntityId>>,
}

impl Entity {
    /// Kind encoded in the identifier
    pub fn kind(&self) -> EntityKind {
        self.id.kind()
    }

    /// A domain field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// A reference field's value, if present and textual
    pub fn reference(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Members of a reciprocal set (empty when the set is undeclared)
    pub fn link_set(&self, name: &str) -> &[EntityId] {
        self.links.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whole document as JSON, including reserved fields and link sets
    pub fn to_document(&self) -> Result<Value, StoreError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode into a typed record of the matching kind
    pub fn decode<T: Record>(&self) -> Result<T, StoreError> {
        if self.kind() != T::KIND {
            return Err(StoreError::InvalidDocument(format!(
                "{} is a {}, not a {}",
                self.id,
                self.kind(),
                T::KIND
            )));
        }
        Ok(serde_json::from_value(self.to_document()?)?)
    }
}

/// A typed domain record stored as an entity document
///
/// Implementors must not serialize reserved fields or reciprocal sets;
/// mark such fields `#[serde(default, skip_serializing)]` so they are
/// readable but never written back.
pub trait Record: Serialize + DeserializeOwned {
    /// The entity kind this record is stored as
    const KIND: EntityKind;

    /// Domain-level checks beyond what deserialization enforces
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Serialize into the field map handed to the repository
    fn to_fields(&self) -> Result<Fields, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::InvalidDocument(format!(
                "{} record serialized to {}, expected an object",
                Self::KIND,
                other
            ))),
        }
    }
}
