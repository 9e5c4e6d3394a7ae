//! `treg init` command - Initialize a new registry project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::core::project::{Project, ProjectError};
use crate::core::store::EntityStore;
use crate::core::Config;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    match Project::init(&path) {
        Ok(project) => {
            // Create the database up front so a bad path fails here, not on first write
            let config = Config::load(Some(&project));
            let db_path = config.database_path(&project);
            EntityStore::open(&db_path, config.busy_timeout())?;

            println!(
                "{} Initialized registry at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!("  config:   {}", project.config_path().display());
            println!("  database: {}", db_path.display());
            println!();
            println!("Next steps:");
            println!(
                "  {} Register a company",
                style("treg new company --set legalName=... --set taxId=...").yellow()
            );
            println!("  {} Show registry status", style("treg status").yellow());
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} Registry already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
