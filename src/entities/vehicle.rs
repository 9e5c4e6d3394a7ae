//! Vehicle entity - registered unit operated by a company

use serde::{Deserialize, Serialize};

use crate::core::entity::Record;
use crate::core::identity::{EntityId, EntityKind};

/// Accepted plate length range
const PLATE_LEN: std::ops::RangeInclusive<usize> = 5..=8;

/// Check a licence plate: uppercase letters, digits and `-`
pub fn validate_plate(plate: &str) -> Result<(), String> {
    if !PLATE_LEN.contains(&plate.len()) {
        return Err(format!(
            "plate '{}' must be {} to {} characters",
            plate,
            PLATE_LEN.start(),
            PLATE_LEN.end()
        ));
    }
    if let Some(c) = plate
        .chars()
        .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(format!("plate '{}' contains invalid character '{}'", plate, c));
    }
    Ok(())
}

/// Registered vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Assigned by the store (VEH-xxx)
    #[serde(default, skip_serializing)]
    pub id: Option<EntityId>,

    /// Licence plate, e.g. `ABC-123`
    pub plate: String,

    /// Operating company
    pub company_id: EntityId,

    /// Resolution the vehicle is authorized under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,

    /// Passenger seats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats: Option<u16>,
}

impl Record for Vehicle {
    const KIND: EntityKind = EntityKind::Vehicle;

    fn validate(&self) -> Result<(), String> {
        validate_plate(&self.plate)
    }
}

impl Vehicle {
    /// Create a new Vehicle
    pub fn new(plate: impl Into<String>, company_id: EntityId) -> Self {
        Self {
            id: None,
            plate: plate.into(),
            company_id,
            resolution_id: None,
            make: None,
            model: None,
            year: None,
            seats: None,
        }
    }
}
