//! vmshift — one-shot cluster rebalancing decisions.
//!
//! Each invocation runs a single cycle: check for in-flight relocations,
//! classify nodes, pick at most one workload to move, and report the
//! outcome. Scheduling repeated runs is left to cron or a timer unit.
//!
//! # Usage
//!
//! ```text
//! vmshift evaluate --config vmshift.toml --snapshot cluster.json
//! vmshift inspect --config vmshift.toml --snapshot cluster.json --format json
//! vmshift default-config > vmshift.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(
    name = "vmshift",
    about = "vmshift — threshold-driven VM rebalancing",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one rebalance cycle and print its outcome.
    ///
    /// Relocations are only logged; the snapshot has no control plane
    /// to hand them to.
    Evaluate {
        /// Rebalance config (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Recorded cluster snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Plan the move without calling the executor
        #[arg(long)]
        dry_run: bool,
    },
    /// Show node records, their roles, and the ranked candidates per source.
    Inspect {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the default config as TOML.
    DefaultConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            config,
            snapshot,
            format,
            dry_run,
        } => commands::evaluate::evaluate(&config, &snapshot, &format, dry_run),
        Commands::Inspect {
            config,
            snapshot,
            format,
        } => commands::inspect::inspect(&config, &snapshot, &format),
        Commands::DefaultConfig => commands::default_config(),
    }
}
