//! Route entity - authorized service between two points

use serde::{Deserialize, Serialize};

use crate::core::entity::Record;
use crate::core::identity::{EntityId, EntityKind};

/// Authorized route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Assigned by the store (RTE-xxx)
    #[serde(default, skip_serializing)]
    pub id: Option<EntityId>,

    /// Route code as published
    pub code: String,

    pub origin: String,

    pub destination: String,

    /// Operating company
    pub company_id: EntityId,

    /// Resolution authorizing the route
    pub resolution_id: EntityId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl Record for Route {
    const KIND: EntityKind = EntityKind::Route;

    fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("route code must not be empty".to_string());
        }
        if self.origin.trim().eq_ignore_ascii_case(self.destination.trim()) {
            return Err(format!(
                "route {} starts and ends at '{}'",
                self.code, self.origin
            ));
        }
        if let Some(km) = self.distance_km {
            if !(km.is_finite() && km > 0.0) {
                return Err(format!("route distanceKm must be positive, got {}", km));
            }
        }
        Ok(())
    }
}

impl Route {
    /// Create a new Route
    pub fn new(
        code: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        company_id: EntityId,
        resolution_id: EntityId,
    ) -> Self {
        Self {
            id: None,
            code: code.into(),
            origin: origin.into(),
            destination: destination.into(),
            company_id,
            resolution_id,
            distance_km: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Route {
        Route::new(
            "R-12",
            "Arequipa",
            "Mollendo",
            EntityId::new(EntityKind::Company),
            EntityId::new(EntityKind::Resolution),
        )
    }

    #[test]
    fn test_route_validation() {
        assert!(sample().validate().is_ok());

        let mut looped = sample();
        looped.destination = "arequipa".into();
        assert!(looped.validate().is_err());

        let mut negative = sample();
        negative.distance_km = Some(-3.0);
        assert!(negative.validate().is_err());
    }
}
