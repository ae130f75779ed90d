//! worksync: reconcile generated work items against a tracker snapshot.
//!
//! # Usage
//!
//! ```text
//! worksync diff --current <json> --desired <json> [--json]
//! worksync merge --current <json> --desired <json> --out <json> [--generated <json>] [--dry-run]
//! worksync hash <path> [--canonical]
//! worksync edits list [--item <id>] [--json]
//! worksync edits clear [--item <id> [--field <field>]]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, edits::EditsCommand, hash::HashArgs, merge::MergeArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "worksync",
    version,
    about = "Idempotent reconciliation of generated work items",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what reconciling desired items onto current items would change.
    Diff(DiffArgs),

    /// Compute the next state and write it, skipping the write when unchanged.
    Merge(MergeArgs),

    /// Print the content digest of a file.
    Hash(HashArgs),

    /// Inspect or clear protected manual edits.
    Edits {
        #[command(subcommand)]
        command: EditsCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Diff(args) => args.run(),
        Commands::Merge(args) => args.run(),
        Commands::Hash(args) => args.run(),
        Commands::Edits { command } => commands::edits::run(command),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
