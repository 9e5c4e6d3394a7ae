//! Transit Registry
//!
//! A reference-consistent entity store for a regional transport authority.
//! Companies, resolutions, vehicles, routes, drivers and users are kept in
//! SQLite; every write checks its references, and reciprocal link sets are
//! maintained in the same transaction as the owning reference.

pub mod cli;
pub mod core;
pub mod entities;
