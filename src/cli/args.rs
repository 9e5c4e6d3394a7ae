//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    audit::{AuditArgs, ResyncArgs},
    id::IdCommands,
    init::InitArgs,
    record::{ListArgs, NewArgs, PurgeArgs, RmArgs, ShowArgs, UpdateArgs},
    resolution::ResolutionCommands,
    status::StatusArgs,
};

#[derive(Parser)]
#[command(name = "treg")]
#[command(author, version, about = "Transport registry")]
#[command(long_about = "A registry of transport companies, operating resolutions, vehicles, routes and drivers, with reference integrity enforced on every write.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .treg/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new registry project
    Init(InitArgs),

    /// Create an entity
    New(NewArgs),

    /// Show one entity, including its link sets
    Show(ShowArgs),

    /// List entities of a kind
    List(ListArgs),

    /// Patch fields of an entity
    Update(UpdateArgs),

    /// Soft-delete an entity
    Rm(RmArgs),

    /// Physically remove soft-deleted entities of a kind
    Purge(PurgeArgs),

    /// Report dangling references and link drift (read-only)
    Audit(AuditArgs),

    /// Rebuild every reciprocal link set from the owning references
    Resync(ResyncArgs),

    /// Show registry status
    Status(StatusArgs),

    /// Resolution lifecycle
    #[command(subcommand)]
    Resolution(ResolutionCommands),

    /// Identifier utilities
    #[command(subcommand)]
    Id(IdCommands),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (details for show, table for list)
    #[default]
    Auto,
    /// JSON format (for programming)
    Json,
    /// Tab-separated values (for piping)
    Tsv,
}
