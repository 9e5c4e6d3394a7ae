//! Entity identity: one canonical identifier per entity
//!
//! Every entity is identified by `<PREFIX>-<ULID>`, e.g.
//! `CO-01HQ3K4N5M6P7R8S9T0VWXYZAB`. The same value is the store's primary
//! key, the value held by reference fields, and what callers see. There is
//! no second identifier space.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Crockford base32 alphabet used by the canonical ULID rendering
const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of the ULID part of an identifier
const ULID_LEN: usize = 26;

/// Entity kinds held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Transport operator
    Company,
    /// Operating permit / administrative resolution
    Resolution,
    /// Registered vehicle
    Vehicle,
    /// Authorized route
    Route,
    /// Licensed driver
    Driver,
    /// Back-office user
    User,
}

impl EntityKind {
    /// Identifier prefix for this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Company => "CO",
            EntityKind::Resolution => "RES",
            EntityKind::Vehicle => "VEH",
            EntityKind::Route => "RTE",
            EntityKind::Driver => "DRV",
            EntityKind::User => "USR",
        }
    }

    /// Collection name, as stored in the `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Company => "company",
            EntityKind::Resolution => "resolution",
            EntityKind::Vehicle => "vehicle",
            EntityKind::Route => "route",
            EntityKind::Driver => "driver",
            EntityKind::User => "user",
        }
    }

    /// Get all kinds
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Company,
            EntityKind::Resolution,
            EntityKind::Vehicle,
            EntityKind::Route,
            EntityKind::Driver,
            EntityKind::User,
        ]
    }

    /// Look up a kind by its exact (uppercase) identifier prefix
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.prefix() == prefix)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = IdParseError;

    /// Accepts the collection name (singular or plural) or the prefix, any case.
    /// This is for command-line convenience only; identifiers stay strict.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "company" | "companies" | "co" => Ok(EntityKind::Company),
            "resolution" | "resolutions" | "res" => Ok(EntityKind::Resolution),
            "vehicle" | "vehicles" | "veh" => Ok(EntityKind::Vehicle),
            "route" | "routes" | "rte" => Ok(EntityKind::Route),
            "driver" | "drivers" | "drv" => Ok(EntityKind::Driver),
            "user" | "users" | "usr" => Ok(EntityKind::User),
            _ => Err(IdParseError::UnknownKind(s.to_string())),
        }
    }
}

/// A canonical entity identifier: kind prefix plus a 128-bit ULID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    kind: EntityKind,
    ulid: Ulid,
}

impl EntityId {
    /// Generate a fresh identifier for the given kind
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            ulid: Ulid::new(),
        }
    }

    /// Create an EntityId from a kind and existing ULID
    pub fn from_parts(kind: EntityKind, ulid: Ulid) -> Self {
        Self { kind, ulid }
    }

    /// Get the entity kind encoded in the identifier
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Get the ULID component
    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse an identifier that must already be in canonical form
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, body) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let kind = EntityKind::from_prefix(prefix)
            .ok_or_else(|| IdParseError::InvalidPrefix(s.to_string()))?;

        if let Some(ch) = body.chars().find(|c| !c.is_ascii() || !CROCKFORD.contains(&(*c as u8))) {
            return Err(IdParseError::InvalidCharacter(s.to_string(), ch));
        }

        if body.len() != ULID_LEN {
            return Err(IdParseError::WrongLength(s.to_string(), body.len()));
        }

        // 26 base32 chars carry 130 bits; the top two must be zero
        if body.as_bytes()[0] > b'7' {
            return Err(IdParseError::Overflow(s.to_string()));
        }

        let ulid = Ulid::from_string(body)
            .map_err(|e| IdParseError::InvalidUlid(s.to_string(), e.to_string()))?;

        Ok(Self { kind, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Produce a new identifier, unique for the practical lifetime of the store
pub fn generate(kind: EntityKind) -> EntityId {
    EntityId::new(kind)
}

/// True only if `candidate` is exactly in canonical form
pub fn validate(candidate: &str) -> bool {
    candidate.parse::<EntityId>().is_ok()
}

/// Map caller input onto the canonical identifier
///
/// Surrounding ASCII whitespace is the only drift tolerated. Anything else
/// (lowercase, truncation, a foreign prefix) is rejected, so one semantic
/// identifier never has two accepted spellings.
pub fn normalize(candidate: &str) -> Result<EntityId, IdParseError> {
    candidate.trim_matches(|c: char| c.is_ascii_whitespace()).parse()
}

/// Errors that can occur when parsing entity IDs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("invalid entity prefix in '{0}' (valid: CO, RES, VEH, RTE, DRV, USR)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in entity ID: '{0}'")]
    MissingDelimiter(String),

    #[error("entity ID '{0}' has a {1}-character body (expected 26)")]
    WrongLength(String, usize),

    #[error("entity ID '{0}' contains invalid character '{1}'")]
    InvalidCharacter(String, char),

    #[error("entity ID '{0}' exceeds 128 bits")]
    Overflow(String),

    #[error("invalid ULID in '{0}': {1}")]
    InvalidUlid(String, String),

    #[error("unknown entity kind: '{0}' (valid: company, resolution, vehicle, route, driver, user)")]
    UnknownKind(String),
}

impl IdParseError {
    /// The rejected input
    pub fn input(&self) -> &str {
        match self {
            IdParseError::InvalidPrefix(s)
            | IdParseError::MissingDelimiter(s)
            | IdParseError::WrongLength(s, _)
            | IdParseError::InvalidCharacter(s, _)
            | IdParseError::Overflow(s)
            | IdParseError::InvalidUlid(s, _)
            | IdParseError::UnknownKind(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_generation() {
        let id = generate(EntityKind::Company);
        assert!(id.to_string().starts_with("CO-"));
        assert_eq!(id.to_string().len(), 29); // CO- (3) + ULID (26)
        assert!(validate(&id.to_string()));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let a = generate(EntityKind::Resolution);
        let b = generate(EntityKind::Resolution);
        assert_ne!(a, b);
    }

    #[test]
    fn test_entity_id_parsing() {
        let original = EntityId::new(EntityKind::Vehicle);
        let parsed = EntityId::parse(&original.to_string()).unwrap();
        assert_eq!(parsed.kind(), EntityKind::Vehicle);
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_lowercase_variant_rejected() {
        let id = EntityId::new(EntityKind::Company).to_string();
        assert!(!validate(&id.to_lowercase()));
        let err = normalize(&id.to_lowercase()).unwrap_err();
        assert!(matches!(err, IdParseError::InvalidPrefix(_)));

        let mixed = format!("CO-{}", id[3..].to_lowercase());
        assert!(matches!(
            normalize(&mixed).unwrap_err(),
            IdParseError::InvalidCharacter(_, _)
        ));
    }

    #[test]
    fn test_truncated_variant_rejected() {
        let id = EntityId::new(EntityKind::Route).to_string();
        let truncated = &id[..id.len() - 1];
        assert!(!validate(truncated));
        assert!(matches!(
            normalize(truncated).unwrap_err(),
            IdParseError::WrongLength(_, 25)
        ));
    }

    #[test]
    fn test_normalize_trims_whitespace_only() {
        let id = EntityId::new(EntityKind::Driver);
        let padded = format!("  {}\n", id);
        assert!(!validate(&padded));
        assert_eq!(normalize(&padded).unwrap(), id);
    }

    #[test]
    fn test_normalize_is_identity_on_canonical_form() {
        for kind in EntityKind::all() {
            let id = EntityId::new(*kind);
            let text = id.to_string();
            assert_eq!(normalize(&text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_entity_id_missing_delimiter() {
        let err = EntityId::parse("CO01HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::MissingDelimiter(_)));
    }

    #[test]
    fn test_entity_id_invalid_prefix() {
        let err = EntityId::parse("EMP-01HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidPrefix(_)));
    }

    #[test]
    fn test_excluded_crockford_letters_rejected() {
        // I, L, O and U are not part of the canonical alphabet
        let err = EntityId::parse("CO-01HQ3K4N5M6P7R8S9T0VWXYZAI").unwrap_err();
        assert!(matches!(err, IdParseError::InvalidCharacter(_, 'I')));
    }

    #[test]
    fn test_overflow_rejected() {
        let err = EntityId::parse("CO-81HQ3K4N5M6P7R8S9T0VWXYZAB").unwrap_err();
        assert!(matches!(err, IdParseError::Overflow(_)));
    }

    #[test]
    fn test_mongo_style_object_id_rejected() {
        assert!(normalize("65a1f2c3d4e5f60718293a4b").is_err());
        assert!(normalize("nonexistent-id").is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("companies".parse::<EntityKind>().unwrap(), EntityKind::Company);
        assert_eq!("RES".parse::<EntityKind>().unwrap(), EntityKind::Resolution);
        assert!("permit".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_serde_roundtrip_is_string() {
        let id = EntityId::new(EntityKind::User);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
