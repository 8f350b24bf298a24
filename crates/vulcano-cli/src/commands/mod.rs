//! CLI commands and argument parsing.

pub mod check;
pub mod compliance;
pub mod detect;
pub mod exec;

use clap::{Parser, Subcommand};

/// Vulcano - compliance profiles for hosts
#[derive(Parser)]
#[command(name = "vulcano")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter (e.g. `info`, `vulcano_runner=debug`); defaults to `RUST_LOG`
    #[arg(long, global = true, env = "VULCANO_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run profiles against this host
    Exec(exec::ExecArgs),

    /// Evaluate and lint profiles without running them
    Check(check::CheckArgs),

    /// Print facts about this host as JSON
    Detect,

    /// Work with profiles on a compliance server
    Compliance(compliance::ComplianceArgs),

    /// Print version information
    Version,
}
