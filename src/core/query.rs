//! Read-only entity queries

use serde_json::Value;

use crate::core::entity::Entity;

/// Equality filters over an entity kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub include_inactive: bool,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Also return soft-deleted entities
    pub fn include_inactive(mut self, yes: bool) -> Self {
        self.include_inactive = yes;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Does `entity` pass every filter
    ///
    /// A filter on a reciprocal set matches when the set contains the value.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.filters.iter().all(|(field, want)| {
            if let Some(value) = entity.field(field) {
                return value == want;
            }
            match want.as_str() {
                Some(member) if entity.links.contains_key(field) => entity
                    .link_set(field)
                    .iter()
                    .any(|id| id.to_string() == member),
                _ => want.is_null(),
            }
        })
    }
}
