//! Resolution entity - operating permit issued to a company
//!
//! A resolution is either a root permit or derived from a parent (a
//! renewal, amendment or extension). The type is kept by the store in step
//! with `parentResolutionId`; see `core::lineage`.

use chrono::{Months, NaiveDate};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::entity::{Entity, Fields, Record};
use crate::core::error::StoreError;
use crate::core::identity::{EntityId, EntityKind};
use crate::core::repository::Repository;

/// Position of a resolution in its lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionType {
    Root,
    Derived,
}

impl std::fmt::Display for ResolutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionType::Root => write!(f, "root"),
            ResolutionType::Derived => write!(f, "derived"),
        }
    }
}

/// Administrative state of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ResolutionStatus {
    #[default]
    Active,
    Suspended,
    Expired,
    Revoked,
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionStatus::Active => write!(f, "active"),
            ResolutionStatus::Suspended => write!(f, "suspended"),
            ResolutionStatus::Expired => write!(f, "expired"),
            ResolutionStatus::Revoked => write!(f, "revoked"),
        }
    }
}

impl std::str::FromStr for ResolutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ResolutionStatus::Active),
            "suspended" => Ok(ResolutionStatus::Suspended),
            "expired" => Ok(ResolutionStatus::Expired),
            "revoked" => Ok(ResolutionStatus::Revoked),
            _ => Err(format!(
                "Invalid resolution status: {}. Use active, suspended, expired, or revoked",
                s
            )),
        }
    }
}

impl ResolutionStatus {
    /// Expired and revoked resolutions never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolutionStatus::Expired | ResolutionStatus::Revoked)
    }

    pub fn can_transition_to(&self, next: ResolutionStatus) -> bool {
        use ResolutionStatus::*;
        matches!(
            (self, next),
            (Active, Suspended) | (Active, Expired) | (Active, Revoked)
                | (Suspended, Active) | (Suspended, Revoked)
        )
    }

    pub fn transition_to(
        &self,
        next: ResolutionStatus,
    ) -> Result<ResolutionStatus, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError {
                from: *self,
                to: next,
            })
        }
    }
}

/// A status change the lifecycle does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("resolution cannot move from {from} to {to}")]
#[diagnostic(
    code(treg::status_transition),
    help("active may become suspended, expired or revoked; suspended may return to active or be revoked")
)]
pub struct StatusTransitionError {
    pub from: ResolutionStatus,
    pub to: ResolutionStatus,
}

impl From<StatusTransitionError> for StoreError {
    fn from(e: StatusTransitionError) -> Self {
        StoreError::StatusTransition {
            kind: EntityKind::Resolution,
            from: e.from.to_string(),
            to: e.to.to_string(),
        }
    }
}

/// Status held by a stored resolution document; absent means active
pub(crate) fn stored_status(fields: &Fields) -> Result<ResolutionStatus, StoreError> {
    match fields.get("status") {
        None | Some(Value::Null) => Ok(ResolutionStatus::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            StoreError::InvalidDocument(format!("stored resolution status: {}", e))
        }),
    }
}

/// Operating permit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Assigned by the store (RES-xxx)
    #[serde(default, skip_serializing)]
    pub id: Option<EntityId>,

    /// Official resolution number
    pub number: String,

    /// Company holding the permit
    pub company_id: EntityId,

    /// Permit this one renews or amends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_resolution_id: Option<EntityId>,

    /// Derived by the store from `parent_resolution_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_type: Option<ResolutionType>,

    /// Date of issue
    pub issued_on: NaiveDate,

    /// Validity in whole years from the issue date
    pub validity_years: u32,

    #[serde(default)]
    pub status: ResolutionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    // Reciprocal sets, maintained by the store
    #[serde(default, skip_serializing)]
    pub child_resolution_ids: Vec<EntityId>,

    #[serde(default, skip_serializing)]
    pub vehicle_ids: Vec<EntityId>,

    #[serde(default, skip_serializing)]
    pub route_ids: Vec<EntityId>,
}

impl Record for Resolution {
    const KIND: EntityKind = EntityKind::Resolution;

    fn validate(&self) -> Result<(), String> {
        if self.number.trim().is_empty() {
            return Err("resolution number must not be empty".to_string());
        }
        if self.validity_years == 0 {
            return Err("resolution validityYears must be at least 1".to_string());
        }
        if self.expires_on().is_none() {
            return Err(format!(
                "resolution validity of {} years is out of range",
                self.validity_years
            ));
        }
        Ok(())
    }
}

impl Resolution {
    /// Create a new root Resolution
    pub fn new(
        number: impl Into<String>,
        company_id: EntityId,
        issued_on: NaiveDate,
        validity_years: u32,
    ) -> Self {
        Self {
            id: None,
            number: number.into(),
            company_id,
            parent_resolution_id: None,
            resolution_type: None,
            issued_on,
            validity_years,
            status: ResolutionStatus::default(),
            notes: None,
            child_resolution_ids: Vec::new(),
            vehicle_ids: Vec::new(),
            route_ids: Vec::new(),
        }
    }

    /// Create a Resolution derived from `parent`
    pub fn derived_from(mut self, parent: EntityId) -> Self {
        self.parent_resolution_id = Some(parent);
        self
    }

    /// Expiry date: the issue date plus the validity, clamped to month end
    pub fn expires_on(&self) -> Option<NaiveDate> {
        let months = self.validity_years.checked_mul(12)?;
        self.issued_on.checked_add_months(Months::new(months))
    }

    /// Has the permit lapsed by `date`
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expires_on().map_or(true, |expiry| date >= expiry)
    }
}

/// Move a resolution to a new status
///
/// The lifecycle is checked against the committed status inside the update
/// transaction. Asking for the current status is a no-op.
pub fn transition(
    repo: &mut Repository,
    id: &str,
    next: ResolutionStatus,
) -> Result<Entity, StoreError> {
    let mut patch = Fields::new();
    patch.insert("status".to_string(), json!(next));
    repo.update(EntityKind::Resolution, id, patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Resolution {
        Resolution::new(
            "RD-0042-2024",
            EntityId::new(EntityKind::Company),
            date(2024, 2, 29),
            5,
        )
    }

    #[test]
    fn test_expiry_clamps_to_month_end() {
        let res = sample();
        assert_eq!(res.expires_on(), Some(date(2029, 2, 28)));
        assert!(!res.is_expired_on(date(2029, 2, 27)));
        assert!(res.is_expired_on(date(2029, 2, 28)));
    }

    #[test]
    fn test_status_lifecycle() {
        use ResolutionStatus::*;
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));
        assert!(Active.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Revoked.can_transition_to(Suspended));
        assert!(!Active.can_transition_to(Active));
        assert!(Expired.is_terminal());

        let err = Revoked.transition_to(Active).unwrap_err();
        assert_eq!(err.from, Revoked);
        assert!(err.to_string().contains("revoked"));

        match StoreError::from(err) {
            StoreError::StatusTransition { kind, from, to } => {
                assert_eq!(kind, EntityKind::Resolution);
                assert_eq!(from, "revoked");
                assert_eq!(to, "active");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stored_status_defaults_to_active() {
        assert_eq!(stored_status(&Fields::new()).unwrap(), ResolutionStatus::Active);

        let mut fields = Fields::new();
        fields.insert("status".into(), json!("expired"));
        assert_eq!(stored_status(&fields).unwrap(), ResolutionStatus::Expired);

        fields.insert("status".into(), json!("paused"));
        assert!(matches!(
            stored_status(&fields),
            Err(StoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "Suspended".parse::<ResolutionStatus>().unwrap(),
            ResolutionStatus::Suspended
        );
        assert!("paused".parse::<ResolutionStatus>().is_err());
    }

    #[test]
    fn test_validation() {
        assert!(sample().validate().is_ok());

        let mut res = sample();
        res.validity_years = 0;
        assert!(res.validate().is_err());

        let mut res = sample();
        res.number = String::new();
        assert!(res.validate().is_err());
    }

    #[test]
    fn test_fields_use_camel_case_and_omit_derived_type() {
        let parent = EntityId::new(EntityKind::Resolution);
        let fields = sample().derived_from(parent).to_fields().unwrap();
        assert_eq!(fields["parentResolutionId"], json!(parent.to_string()));
        assert_eq!(fields["issuedOn"], json!("2024-02-29"));
        assert_eq!(fields["status"], json!("active"));
        assert!(!fields.contains_key("resolutionType"));
        assert!(!fields.contains_key("routeIds"));
    }
}
