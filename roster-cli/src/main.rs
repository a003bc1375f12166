//! Roster — declarative directory group membership reconciliation.
//!
//! # Usage
//!
//! ```text
//! roster init [--force]
//! roster check [--config P] [--credentials P] [--json]
//! roster plan --snapshot FILE [TARGET] [--json]
//! roster sync --snapshot FILE [TARGET] [--dry-run] [--continue-on-error] [--json]
//! ```
//!
//! `-v` (repeatable) raises log verbosity, `-q` limits logs to errors.
//! `RUST_LOG` overrides both.

mod commands;
mod output;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{check::CheckArgs, init::InitArgs, plan::PlanArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "roster",
    version,
    about = "Reconcile directory group membership from include/exclude rules",
    long_about = None,
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold ~/.roster/config.yaml and ~/.roster/credentials.yaml.
    Init(InitArgs),

    /// Validate configuration and credentials without contacting a directory.
    Check(CheckArgs),

    /// Show the membership changes a sync would make.
    Plan(PlanArgs),

    /// Reconcile target groups against a directory snapshot.
    Sync(SyncArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Sync(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
