//! Company entity - licensed transport operator

use serde::{Deserialize, Serialize};

use crate::core::entity::Record;
use crate::core::identity::{EntityId, EntityKind};

/// Transport operator holding resolutions, vehicles and routes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    /// Assigned by the store (CO-xxx)
    #[serde(default, skip_serializing)]
    pub id: Option<EntityId>,

    /// Registered legal name
    pub legal_name: String,

    /// Taxpayer identification number
    pub tax_id: String,

    /// Name used with the public
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    // Reciprocal sets, maintained by the store
    #[serde(default, skip_serializing)]
    pub resolution_ids: Vec<EntityId>,

    #[serde(default, skip_serializing)]
    pub vehicle_ids: Vec<EntityId>,

    #[serde(default, skip_serializing)]
    pub route_ids: Vec<EntityId>,

    #[serde(default, skip_serializing)]
    pub driver_ids: Vec<EntityId>,
}

impl Record for Company {
    const KIND: EntityKind = EntityKind::Company;

    fn validate(&self) -> Result<(), String> {
        if self.legal_name.trim().is_empty() {
            return Err("company legalName must not be empty".to_string());
        }
        if self.tax_id.trim().is_empty() {
            return Err("company taxId must not be empty".to_string());
        }
        Ok(())
    }
}

impl Company {
    /// Create a new Company
    pub fn new(legal_name: impl Into<String>, tax_id: impl Into<String>) -> Self {
        Self {
            legal_name: legal_name.into(),
            tax_id: tax_id.into(),
            ..Self::default()
        }
    }
}
