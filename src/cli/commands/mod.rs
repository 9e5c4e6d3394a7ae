//! CLI command implementations

pub mod audit;
pub mod id;
pub mod init;
pub mod record;
pub mod resolution;
pub mod status;
