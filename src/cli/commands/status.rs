//! `treg status` command - registry status dashboard

use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{discover_project, open_repository};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::store::SCHEMA_VERSION;

#[derive(clap::Args, Debug)]
pub struct StatusArgs {}

pub fn run(_args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let project = discover_project(global)?;
    let repo = open_repository(global)?;
    let stats = repo.statistics()?;

    match global.format {
        OutputFormat::Json => {
            let status = serde_json::json!({
                "root": project.root(),
                "database": repo.store().path(),
                "schemaVersion": SCHEMA_VERSION,
                "stats": stats,
            });
            let out = serde_json::to_string_pretty(&status)
                .map_err(|e| miette::miette!("failed to render JSON: {}", e))?;
            println!("{}", out);
        }
        OutputFormat::Tsv => {
            println!("KIND\tACTIVE\tINACTIVE");
            for (kind, count) in &stats.by_kind {
                println!("{}\t{}\t{}", kind, count.active, count.inactive);
            }
        }
        OutputFormat::Auto => {
            println!("{}", style("Registry Status").bold().underlined());
            println!("{}", "═".repeat(48));
            println!("  root:     {}", style(project.root().display()).cyan());
            if let Some(path) = repo.store().path() {
                println!("  database: {}", style(path.display()).cyan());
            }
            println!("  schema:   v{}", SCHEMA_VERSION);
            println!();

            let mut builder = Builder::default();
            builder.push_record(["KIND", "ACTIVE", "INACTIVE"]);
            for (kind, count) in &stats.by_kind {
                builder.push_record([
                    kind.to_string(),
                    count.active.to_string(),
                    count.inactive.to_string(),
                ]);
            }
            println!("{}", builder.build().with(Style::markdown()));
            println!();
            println!(
                "{} entities, {} link rows, {} bytes",
                style(stats.total_entities).cyan(),
                style(stats.link_rows).cyan(),
                stats.db_size_bytes
            );
        }
    }
    Ok(())
}
