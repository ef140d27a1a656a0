//! Roster — published shift roster → shift store reconciliation CLI.
//!
//! # Usage
//!
//! ```text
//! roster [--config <path>] [--verbose]            (same as `roster sync`)
//! roster sync [--shop <id>]... [--group <n>] [--days <n>] [--dry-run] [--json]
//! roster status [--date YYYY-MM-DD] [--json]
//! roster request <member_id> <date> <start> <end> [--name <display name>]
//! ```
//!
//! Exit code is 0 whenever setup succeeds; skipped dates and observations are
//! reported, not fatal.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{request::RequestArgs, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "roster",
    version,
    about = "Reconcile a published shift roster into the shift store",
    long_about = None,
)]
struct Cli {
    /// Config file (default: ~/.roster/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG says otherwise.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape the roster window and reconcile it into the store (default).
    Sync(SyncArgs),

    /// Show stored shifts for a date.
    Status(StatusArgs),

    /// Record a human shift request that later syncs must not overwrite.
    Request(RequestArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Some(Commands::Sync(args)) => args.run(config),
        Some(Commands::Status(args)) => args.run(config),
        Some(Commands::Request(args)) => args.run(config),
        None => SyncArgs::default().run(config),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
