//! `treg id` commands - identifier utilities

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{self, EntityKind};

#[derive(Subcommand, Debug)]
pub enum IdCommands {
    /// Generate a fresh identifier
    New(IdNewArgs),

    /// Validate and normalize an identifier
    Check(IdCheckArgs),
}

#[derive(clap::Args, Debug)]
pub struct IdNewArgs {
    pub kind: EntityKind,
}

#[derive(clap::Args, Debug)]
pub struct IdCheckArgs {
    pub value: String,
}

pub fn run(cmd: IdCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        IdCommands::New(args) => {
            println!("{}", identity::generate(args.kind));
            Ok(())
        }
        IdCommands::Check(args) => run_check(args, global),
    }
}

fn run_check(args: IdCheckArgs, global: &GlobalOpts) -> Result<()> {
    match identity::normalize(&args.value) {
        Ok(id) => {
            match global.format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "valid": true, "id": id, "kind": id.kind() })
                ),
                _ if global.quiet => println!("{}", id),
                _ => println!("{} {} ({})", style("✓").green(), id, id.kind()),
            }
            Ok(())
        }
        Err(e) => {
            if global.format == OutputFormat::Json {
                println!(
                    "{}",
                    serde_json::json!({ "valid": false, "error": e.to_string() })
                );
            }
            Err(miette::miette!("{}", e))
        }
    }
}
