//! Core module - identifiers, storage and integrity

pub mod config;
pub mod entity;
pub mod error;
pub mod identity;
pub mod integrity;
pub mod lineage;
pub mod links;
pub mod project;
pub mod query;
pub mod repository;
pub mod retry;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_log;

pub use config::Config;
pub use entity::{Entity, Fields, Record};
pub use error::StoreError;
pub use identity::{EntityId, EntityKind, IdParseError};
pub use integrity::{IntegrityViolation, ViolationKind};
pub use lineage::LineageDecl;
pub use links::{LinkRegistry, ReferenceDecl, RegistryError};
pub use project::{Project, ProjectError};
pub use query::Query;
pub use repository::{Repository, Validator};
pub use retry::RetryConfig;
pub use store::{EntityStore, KindCount, StoreStats};
pub use sync::SyncStats;
