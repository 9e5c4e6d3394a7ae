//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use miette::Result;
use serde_json::Value;

use crate::cli::GlobalOpts;
use crate::core::entity::Fields;
use crate::core::identity::EntityId;
use crate::core::project::Project;
use crate::core::repository::Repository;
use crate::core::store::EntityStore;
use crate::core::Config;
use crate::entities;

/// Locate the project from `--project` or the current directory
pub fn discover_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Open the project's store as a transport repository
pub fn open_repository(global: &GlobalOpts) -> Result<Repository> {
    let project = discover_project(global)?;
    let config = Config::load(Some(&project));
    let store = EntityStore::open(&config.database_path(&project), config.busy_timeout())?;
    Ok(entities::transport_repository(store).with_retry(config.retry_config()))
}

/// Parse `key=value`; the value is JSON when it parses as JSON, else a string
pub fn parse_assignment(s: &str) -> Result<(String, Value)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| miette::miette!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(miette::miette!("empty field name in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Collect `--set` assignments into a field map
pub fn parse_assignments(pairs: &[String]) -> Result<Fields> {
    let mut fields = Fields::new();
    for pair in pairs {
        let (key, value) = parse_assignment(pair)?;
        fields.insert(key, value);
    }
    Ok(fields)
}

/// Format an EntityId for display, truncating if too long
///
/// IDs longer than 16 characters are truncated to 13 chars with "..." suffix.
/// This provides a consistent display format across all list/table outputs.
pub fn format_short_id(id: &EntityId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Render a field value for a table cell
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityKind;
    use serde_json::json;

    #[test]
    fn test_format_short_id() {
        let id = EntityId::new(EntityKind::Resolution);
        let formatted = format_short_id(&id);
        // RES- plus 26 ULID characters is well past 16
        assert_eq!(formatted.len(), 16);
        assert!(formatted.starts_with("RES-"));
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("Pucallpa–Lima", 8), "Pucal...");
    }

    #[test]
    fn test_parse_assignment_types() {
        assert_eq!(parse_assignment("seats=30").unwrap(), ("seats".into(), json!(30)));
        assert_eq!(
            parse_assignment("plate=ABC-123").unwrap(),
            ("plate".into(), json!("ABC-123"))
        );
        assert_eq!(
            parse_assignment("note=a=b").unwrap(),
            ("note".into(), json!("a=b"))
        );
        assert_eq!(
            parse_assignment("resolutionId=null").unwrap().1,
            Value::Null
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell(None), "");
        assert_eq!(cell(Some(&json!("x"))), "x");
        assert_eq!(cell(Some(&json!(4))), "4");
    }
}
