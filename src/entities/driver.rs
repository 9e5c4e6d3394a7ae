//! Driver entity - licensed driver, optionally employed by a company

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::entity::Record;
use crate::core::identity::{EntityId, EntityKind};

/// Licensed driver
///
/// The company reference survives the company's soft deletion; audit
/// tolerates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    /// Assigned by the store (DRV-xxx)
    #[serde(default, skip_serializing)]
    pub id: Option<EntityId>,

    pub full_name: String,

    pub license_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_expires_on: Option<NaiveDate>,

    /// Employing company
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<EntityId>,
}

impl Record for Driver {
    const KIND: EntityKind = EntityKind::Driver;

    fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("driver fullName must not be empty".to_string());
        }
        if self.license_number.trim().is_empty() {
            return Err("driver licenseNumber must not be empty".to_string());
        }
        Ok(())
    }
}

impl Driver {
    /// Create a new Driver
    pub fn new(full_name: impl Into<String>, license_number: impl Into<String>) -> Self {
        Self {
            id: None,
            full_name: full_name.into(),
            license_number: license_number.into(),
            license_expires_on: None,
            company_id: None,
        }
    }

    /// Is the licence valid on `date`
    pub fn is_licensed_on(&self, date: NaiveDate) -> bool {
        self.license_expires_on.map_or(true, |expiry| date < expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_validation() {
        assert!(Driver::new("Rosa Quispe", "Q40512873").validate().is_ok());
        assert!(Driver::new("Rosa Quispe", " ").validate().is_err());
    }

    #[test]
    fn test_licence_expiry() {
        let mut driver = Driver::new("Rosa Quispe", "Q40512873");
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(driver.is_licensed_on(day));
        driver.license_expires_on = Some(day);
        assert!(!driver.is_licensed_on(day));
    }
}
