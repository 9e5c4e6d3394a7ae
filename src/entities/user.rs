//! User entity - back-office account

use serde::{Deserialize, Serialize};

use crate::core::entity::Record;
use crate::core::identity::{EntityId, EntityKind};

/// Access level of a back-office user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum UserRole {
    Admin,
    #[default]
    Operator,
    Auditor,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Operator => write!(f, "operator"),
            UserRole::Auditor => write!(f, "auditor"),
        }
    }
}

/// Back-office user; carries no references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Assigned by the store (USR-xxx)
    #[serde(default, skip_serializing)]
    pub id: Option<EntityId>,

    pub username: String,

    pub email: String,

    #[serde(default)]
    pub role: UserRole,
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;

    fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("username must not be empty".to_string());
        }
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(format!("'{}' is not an email address", self.email)),
        }
    }
}

impl User {
    /// Create a new User
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: email.into(),
            role: UserRole::default(),
        }
    }
}
