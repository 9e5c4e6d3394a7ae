//! `treg resolution` commands - resolution lifecycle

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::open_repository;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityKind;
use crate::entities::resolution::{self, ResolutionStatus};

#[derive(Subcommand, Debug)]
pub enum ResolutionCommands {
    /// Move a resolution to a new status
    Transition(TransitionArgs),

    /// List resolutions derived from a resolution
    Children(ChildrenArgs),
}

#[derive(clap::Args, Debug)]
pub struct TransitionArgs {
    /// Resolution ID
    pub id: String,

    /// Target status (active, suspended, expired, revoked)
    pub status: ResolutionStatus,
}

#[derive(clap::Args, Debug)]
pub struct ChildrenArgs {
    /// Resolution ID
    pub id: String,
}

pub fn run(cmd: ResolutionCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ResolutionCommands::Transition(args) => run_transition(args, global),
        ResolutionCommands::Children(args) => run_children(args, global),
    }
}

fn run_transition(args: TransitionArgs, global: &GlobalOpts) -> Result<()> {
    let mut repo = open_repository(global)?;
    let entity = resolution::transition(&mut repo, &args.id, args.status)?;

    match global.format {
        OutputFormat::Json => {
            let out = serde_json::to_string_pretty(&entity.to_document()?)
                .map_err(|e| miette::miette!("failed to render JSON: {}", e))?;
            println!("{}", out);
        }
        _ if global.quiet => {}
        _ => {
            println!(
                "{} Resolution {} is now {}",
                style("✓").green(),
                style(entity.id.to_string()).cyan(),
                style(args.status).yellow()
            );
        }
    }
    Ok(())
}

fn run_children(args: ChildrenArgs, global: &GlobalOpts) -> Result<()> {
    let repo = open_repository(global)?;
    let children = repo.referrers(EntityKind::Resolution, &args.id, "childResolutionIds")?;

    match global.format {
        OutputFormat::Json => {
            let out = serde_json::to_string_pretty(&children)
                .map_err(|e| miette::miette!("failed to render JSON: {}", e))?;
            println!("{}", out);
        }
        _ => {
            for child in &children {
                println!("{}", child);
            }
        }
    }
    Ok(())
}
