use clap::Parser;
use miette::Result;
use treg::cli::commands::{audit, id, init, record, resolution, status};
use treg::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(global.quiet, global.verbose)?;

    match cli.command {
        Commands::Init(args) => init::run(args),
        Commands::New(args) => record::run_new(args, &global),
        Commands::Show(args) => record::run_show(args, &global),
        Commands::List(args) => record::run_list(args, &global),
        Commands::Update(args) => record::run_update(args, &global),
        Commands::Rm(args) => record::run_rm(args, &global),
        Commands::Purge(args) => record::run_purge(args, &global),
        Commands::Audit(args) => audit::run(args, &global),
        Commands::Resync(args) => audit::run_resync(args, &global),
        Commands::Status(args) => status::run(args, &global),
        Commands::Resolution(cmd) => resolution::run(cmd, &global),
        Commands::Id(cmd) => id::run(cmd, &global),
    }
}

/// Log to stderr; `TREG_LOG` overrides the level picked by --quiet/--verbose
fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("TREG_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| miette::miette!("{}", e))
}
