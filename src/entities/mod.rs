//! Entity type definitions
//!
//! The registry holds the following entity types:
//!
//! - [`Company`] - Licensed transport operator
//! - [`Resolution`] - Operating permit, root or derived from a parent
//! - [`Vehicle`] - Registered vehicle operated by a company
//! - [`Route`] - Authorized route under a resolution
//! - [`Driver`] - Licensed driver, optionally employed by a company
//! - [`User`] - Back-office account

pub mod company;
pub mod driver;
pub mod resolution;
pub mod route;
pub mod user;
pub mod vehicle;

pub use company::Company;
pub use driver::Driver;
pub use resolution::{Resolution, ResolutionStatus, ResolutionType, StatusTransitionError};
pub use route::Route;
pub use user::{User, UserRole};
pub use vehicle::Vehicle;

use serde_json::Value;

use crate::core::entity::{Entity, Fields, Record};
use crate::core::error::StoreError;
use crate::core::identity::EntityKind;
use crate::core::links::LinkRegistry;
use crate::core::repository::Repository;
use crate::core::store::EntityStore;

fn check<T: Record>(fields: &Fields) -> Result<T, StoreError> {
    let record: T = serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|e| StoreError::InvalidDocument(format!("invalid {}: {}", T::KIND, e)))?;
    record.validate().map_err(StoreError::InvalidDocument)?;
    Ok(record)
}

/// Decode fields into the kind's record type and run its checks
pub fn validate_fields(kind: EntityKind, fields: &Fields) -> Result<(), StoreError> {
    match kind {
        EntityKind::Company => check::<Company>(fields).map(drop),
        EntityKind::Resolution => check::<Resolution>(fields).map(drop),
        EntityKind::Vehicle => check::<Vehicle>(fields).map(drop),
        EntityKind::Route => check::<Route>(fields).map(drop),
        EntityKind::Driver => check::<Driver>(fields).map(drop),
        EntityKind::User => check::<User>(fields).map(drop),
    }
}

/// Write-time validation for the transport registry
///
/// Runs the record checks on the fields being written. On update, a
/// resolution's status may only move along its lifecycle.
pub fn validate_write(
    kind: EntityKind,
    stored: Option<&Fields>,
    fields: &Fields,
) -> Result<(), StoreError> {
    if kind != EntityKind::Resolution {
        return validate_fields(kind, fields);
    }
    let next = check::<Resolution>(fields)?.status;
    if let Some(stored) = stored {
        let current = resolution::stored_status(stored)?;
        if current != next {
            current.transition_to(next)?;
        }
    }
    Ok(())
}

/// Repository with the transport relationships and record validation
pub fn transport_repository(store: EntityStore) -> Repository {
    Repository::new(store, LinkRegistry::transport()).with_validator(validate_write)
}

/// Field shown as an entity's title in listings
pub fn title_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Company => "legalName",
        EntityKind::Resolution => "number",
        EntityKind::Vehicle => "plate",
        EntityKind::Route => "code",
        EntityKind::Driver => "fullName",
        EntityKind::User => "username",
    }
}

/// Human-readable title of a stored entity
pub fn title(entity: &Entity) -> String {
    match entity.field(title_field(entity.kind())) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
