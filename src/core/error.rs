//! Store error taxonomy

use miette::Diagnostic;
use thiserror::Error;

use crate::core::identity::{EntityKind, IdParseError};

/// Errors raised by repository operations
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("invalid identifier format: '{value}'")]
    #[diagnostic(
        code(treg::invalid_identifier),
        help("identifiers look like CO-01HQ3K4N5M6P7R8S9T0VWXYZAB (uppercase, 26-character ULID)")
    )]
    InvalidIdentifierFormat {
        value: String,
        #[source]
        reason: IdParseError,
    },

    #[error("{kind} {id} not found")]
    #[diagnostic(code(treg::not_found))]
    NotFound { kind: EntityKind, id: String },

    #[error("{field} references {target_kind} '{value}', which does not exist or is inactive")]
    #[diagnostic(
        code(treg::reference_not_found),
        help("create the target first, or point the reference at an active entity")
    )]
    ReferenceNotFound {
        field: String,
        target_kind: EntityKind,
        value: String,
    },

    #[error("{kind} requires reference field '{field}'")]
    #[diagnostic(code(treg::missing_reference))]
    MissingReference { kind: EntityKind, field: String },

    #[error("field '{field}' is managed by the store and cannot be written")]
    #[diagnostic(code(treg::read_only_field))]
    ReadOnlyField { field: String },

    #[error("could not link {owner} into {target}.{field}: {reason}")]
    #[diagnostic(
        code(treg::link_sync_failure),
        help("the write was rolled back; `treg resync` rebuilds reciprocal links")
    )]
    LinkSyncFailure {
        owner: String,
        target: String,
        field: String,
        reason: String,
        transient: bool,
    },

    #[error("resolutionType '{declared}' contradicts parentResolutionId (expected '{expected}')")]
    #[diagnostic(code(treg::lineage_mismatch))]
    LineageMismatch { declared: String, expected: String },

    #[error("resolution {id} cannot descend from itself")]
    #[diagnostic(code(treg::lineage_cycle))]
    LineageCycle { id: String },

    #[error("{kind} cannot move from {from} to {to}")]
    #[diagnostic(
        code(treg::status_transition),
        help("active may become suspended, expired or revoked; suspended may return to active or be revoked")
    )]
    StatusTransition {
        kind: EntityKind,
        from: String,
        to: String,
    },

    #[error("invalid document: {0}")]
    #[diagnostic(code(treg::invalid_document))]
    InvalidDocument(String),

    #[error("store schema version {found} is not supported (expected {expected})")]
    #[diagnostic(code(treg::schema_version))]
    SchemaVersion { found: i32, expected: i32 },

    #[error("database error: {0}")]
    #[diagnostic(code(treg::database))]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    #[diagnostic(code(treg::io))]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    #[diagnostic(code(treg::serialization))]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Errors caused by bad input. These map to a 4xx-equivalent response
    /// and are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidIdentifierFormat { .. }
                | StoreError::NotFound { .. }
                | StoreError::ReferenceNotFound { .. }
                | StoreError::MissingReference { .. }
                | StoreError::ReadOnlyField { .. }
                | StoreError::LineageMismatch { .. }
                | StoreError::LineageCycle { .. }
                | StoreError::StatusTransition { .. }
                | StoreError::InvalidDocument(_)
        )
    }

    /// Lock contention and similar conditions that may clear on retry
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => is_transient_sqlite_error(e),
            StoreError::LinkSyncFailure { transient, .. } => *transient,
            _ => false,
        }
    }
}

impl From<IdParseError> for StoreError {
    fn from(reason: IdParseError) -> Self {
        StoreError::InvalidIdentifierFormat {
            value: reason.input().to_string(),
            reason,
        }
    }
}

/// Busy / locked database, the only SQLite failures worth retrying
pub fn is_transient_sqlite_error(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}
