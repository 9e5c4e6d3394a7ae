//! `treg audit` and `treg resync` - integrity sweep and link rebuild

use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::open_repository;
use crate::cli::{GlobalOpts, OutputFormat};

#[derive(clap::Args, Debug)]
pub struct AuditArgs {
    /// Exit successfully even when violations are found
    #[arg(long)]
    pub no_fail: bool,
}

#[derive(clap::Args, Debug)]
pub struct ResyncArgs {}

pub fn run(args: AuditArgs, global: &GlobalOpts) -> Result<()> {
    let repo = open_repository(global)?;
    let violations = repo.audit_all()?;

    match global.format {
        OutputFormat::Json => {
            let out = serde_json::to_string_pretty(&violations)
                .map_err(|e| miette::miette!("failed to render JSON: {}", e))?;
            println!("{}", out);
        }
        OutputFormat::Tsv => {
            println!("KIND\tENTITY\tFIELD\tVALUE");
            for v in &violations {
                println!(
                    "{}\t{}\t{}\t{}",
                    v.kind,
                    v.entity_id,
                    v.field,
                    v.dangling_value.as_deref().unwrap_or("")
                );
            }
        }
        OutputFormat::Auto => {
            if violations.is_empty() {
                if !global.quiet {
                    println!("{} No integrity violations", style("✓").green());
                }
                return Ok(());
            }
            let mut builder = Builder::default();
            builder.push_record(["KIND", "ENTITY", "FIELD", "VALUE"]);
            for v in &violations {
                builder.push_record([
                    v.kind.to_string(),
                    v.entity_id.to_string(),
                    v.field.clone(),
                    v.dangling_value.clone().unwrap_or_default(),
                ]);
            }
            println!("{}", builder.build().with(Style::markdown()));
            println!();
        }
    }

    if violations.is_empty() || args.no_fail {
        Ok(())
    } else {
        Err(miette::miette!(
            help = "run 'treg resync' to repair link drift; dangling references need an update",
            "{} integrity violation(s) found",
            violations.len()
        ))
    }
}

pub fn run_resync(_args: ResyncArgs, global: &GlobalOpts) -> Result<()> {
    let mut repo = open_repository(global)?;
    let stats = repo.resync_links()?;

    match global.format {
        OutputFormat::Json => {
            let out = serde_json::to_string_pretty(&stats)
                .map_err(|e| miette::miette!("failed to render JSON: {}", e))?;
            println!("{}", out);
        }
        _ if global.quiet => {}
        _ if stats.is_clean() => {
            println!("{} Link sets already consistent", style("✓").green());
        }
        _ => {
            println!(
                "{} Resynced link sets: {} added, {} removed",
                style("✓").green(),
                style(stats.added).cyan(),
                style(stats.removed).cyan()
            );
        }
    }
    Ok(())
}
