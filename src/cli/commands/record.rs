//! Entity record commands: `new`, `show`, `list`, `update`, `rm`, `purge`

use console::style;
use miette::Result;
use serde_json::Value;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{
    cell, format_short_id, open_repository, parse_assignment, parse_assignments, truncate_str,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::entity::{Entity, Fields};
use crate::core::identity::EntityKind;
use crate::core::query::Query;
use crate::entities;

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Entity kind (company, resolution, vehicle, route, driver, user)
    pub kind: EntityKind,

    /// Field assignment, repeatable (key=value; JSON values accepted)
    #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    pub kind: EntityKind,

    /// Entity ID
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    pub kind: EntityKind,

    /// Equality filter, repeatable (key=value)
    #[arg(long = "where", short = 'w', value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Include soft-deleted entities
    #[arg(long)]
    pub all: bool,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    pub kind: EntityKind,

    /// Entity ID
    pub id: String,

    /// Field assignment, repeatable (key=value; JSON values accepted)
    #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Clear a field, repeatable
    #[arg(long = "unset", value_name = "KEY")]
    pub unset: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    pub kind: EntityKind,

    /// Entity ID
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct PurgeArgs {
    pub kind: EntityKind,
}

pub fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let fields = parse_assignments(&args.set)?;
    let mut repo = open_repository(global)?;
    let entity = repo.create(args.kind, fields)?;
    report_written(&entity, "Created", global)
}

pub fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let repo = open_repository(global)?;
    let entity = repo
        .find_by_id(args.kind, &args.id)?
        .ok_or_else(|| miette::miette!("no {} with id '{}'", args.kind, args.id))?;

    match global.format {
        OutputFormat::Json => print_json(&entity.to_document()?),
        OutputFormat::Tsv => {
            for (key, value) in document_rows(&entity) {
                println!("{}\t{}", key, value);
            }
            Ok(())
        }
        OutputFormat::Auto => {
            let title = entities::title(&entity);
            println!(
                "{} {}",
                style(entity.id.to_string()).cyan().bold(),
                style(title).bold()
            );
            if !entity.is_active {
                println!("{}", style("(inactive)").red());
            }
            println!("{}", "─".repeat(60));
            let mut builder = Builder::default();
            builder.push_record(["FIELD", "VALUE"]);
            for (key, value) in document_rows(&entity) {
                builder.push_record([key, value]);
            }
            println!("{}", builder.build().with(Style::markdown()));
            Ok(())
        }
    }
}

pub fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut query = Query::new().include_inactive(args.all);
    for filter in &args.filters {
        let (key, value) = parse_assignment(filter)?;
        query = query.where_eq(key, value);
    }
    if let Some(n) = args.limit {
        query = query.limit(n);
    }

    let repo = open_repository(global)?;
    let found = repo.find_by_query(args.kind, &query)?;

    match global.format {
        OutputFormat::Json => {
            let docs = found
                .iter()
                .map(Entity::to_document)
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&Value::Array(docs))
        }
        OutputFormat::Tsv => {
            println!("ID\tTITLE\tACTIVE");
            for entity in &found {
                println!(
                    "{}\t{}\t{}",
                    entity.id,
                    entities::title(entity),
                    entity.is_active
                );
            }
            Ok(())
        }
        OutputFormat::Auto => {
            if found.is_empty() {
                if !global.quiet {
                    println!("No {} found.", args.kind);
                }
                return Ok(());
            }
            let columns = list_columns(args.kind);
            let mut header = vec!["ID".to_string(), "TITLE".to_string()];
            header.extend(columns.iter().map(|c| c.to_string()));
            if args.all {
                header.push("ACTIVE".to_string());
            }

            let mut builder = Builder::default();
            builder.push_record(header);
            for entity in &found {
                let mut row = vec![
                    format_short_id(&entity.id),
                    truncate_str(&entities::title(entity), 32),
                ];
                row.extend(
                    columns
                        .iter()
                        .map(|c| truncate_str(&cell(entity.field(c)), 20)),
                );
                if args.all {
                    row.push(if entity.is_active { "yes" } else { "no" }.to_string());
                }
                builder.push_record(row);
            }
            println!("{}", builder.build().with(Style::markdown()));
            if !global.quiet {
                println!();
                println!("{} {}(s)", style(found.len()).cyan(), args.kind);
            }
            Ok(())
        }
    }
}

pub fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let mut patch: Fields = parse_assignments(&args.set)?;
    for key in &args.unset {
        patch.insert(key.clone(), Value::Null);
    }
    if patch.is_empty() {
        return Err(miette::miette!("nothing to update; pass --set or --unset"));
    }

    let mut repo = open_repository(global)?;
    let entity = repo.update(args.kind, &args.id, patch)?;
    report_written(&entity, "Updated", global)
}

pub fn run_rm(args: RmArgs, global: &GlobalOpts) -> Result<()> {
    let mut repo = open_repository(global)?;
    repo.soft_delete(args.kind, &args.id)?;
    if !global.quiet {
        println!(
            "{} Deactivated {} {}",
            style("✓").green(),
            args.kind,
            style(&args.id).cyan()
        );
    }
    Ok(())
}

pub fn run_purge(args: PurgeArgs, global: &GlobalOpts) -> Result<()> {
    let mut repo = open_repository(global)?;
    let purged = repo.purge_inactive(args.kind)?;
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "purged": purged })),
        _ => {
            if !global.quiet {
                println!(
                    "{} Purged {} inactive {}(s)",
                    style("✓").green(),
                    style(purged).cyan(),
                    args.kind
                );
            }
            Ok(())
        }
    }
}

fn report_written(entity: &Entity, verb: &str, global: &GlobalOpts) -> Result<()> {
    match global.format {
        OutputFormat::Json => print_json(&entity.to_document()?),
        OutputFormat::Tsv => {
            println!("{}", entity.id);
            Ok(())
        }
        OutputFormat::Auto => {
            if global.quiet {
                println!("{}", entity.id);
            } else {
                println!(
                    "{} {} {} {}",
                    style("✓").green(),
                    verb,
                    entity.kind(),
                    style(entity.id.to_string()).cyan()
                );
            }
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| miette::miette!("failed to render JSON: {}", e))?;
    println!("{}", out);
    Ok(())
}

/// Key/value rows for the detail view: reserved fields, then domain fields, then link sets
fn document_rows(entity: &Entity) -> Vec<(String, String)> {
    let mut rows = vec![
        ("id".to_string(), entity.id.to_string()),
        ("isActive".to_string(), entity.is_active.to_string()),
        ("createdAt".to_string(), entity.created_at.to_rfc3339()),
        ("updatedAt".to_string(), entity.updated_at.to_rfc3339()),
    ];
    rows.extend(
        entity
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), cell(Some(v)))),
    );
    rows.extend(entity.links.iter().map(|(k, members)| {
        let joined = members
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        (k.clone(), joined)
    }));
    rows
}

/// Extra table columns per kind
fn list_columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Company => &["taxId"],
        EntityKind::Resolution => &["resolutionType", "status", "issuedOn"],
        EntityKind::Vehicle => &["make", "seats"],
        EntityKind::Route => &["origin", "destination"],
        EntityKind::Driver => &["licenseNumber"],
        EntityKind::User => &["email", "role"],
    }
}
