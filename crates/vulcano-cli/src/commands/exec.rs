//! Exec command implementation.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use vulcano_core::{LocalBackend, ProfileFetcher, ProfileRef, RemoteRef, RunStatus, RunSummary};
use vulcano_runner::{ConsoleReporter, JsonReporter, Reporter, Resolver, RunConfig, Runner};

use super::compliance::ServerArgs;

/// Every rule passed.
pub const EXIT_PASSED: u8 = 0;
/// At least one rule failed.
pub const EXIT_FAILED: u8 = 100;
/// No rule failed, some were skipped.
pub const EXIT_SKIPPED: u8 = 101;
/// Some profile or rule could not be resolved, evaluated or compiled.
pub const EXIT_INCOMPLETE: u8 = 102;

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable report
    Console,
    /// Machine-readable run summary
    Json,
}

/// Options shared by every command that runs profiles.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunOptions {
    /// Output format
    #[arg(short, long, value_enum, default_value = "console")]
    pub format: Format,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Only print leaves that did not pass
    #[arg(short, long)]
    pub quiet: bool,

    /// Evaluate profiles in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Number of parallel workers
    #[arg(short, long, default_value = "4")]
    pub workers: usize,

    /// Skip remaining tests after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Override the profile ID of every loaded profile
    #[arg(long, env = "VULCANO_PROFILE_ID")]
    pub profile_id: Option<String>,

    /// Line number of the first line of each profile
    #[arg(long, default_value = "1")]
    pub line_offset: usize,
}

impl RunOptions {
    /// Builds the run configuration.
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new()
            .with_parallel(self.parallel)
            .with_workers(self.workers)
            .with_fail_fast(self.fail_fast)
            .with_line_offset(self.line_offset);
        if let Some(id) = &self.profile_id {
            config = config.with_profile_id(id.clone());
        }
        config
    }

    /// Writes `summary` to stdout in the selected format.
    pub fn report(&self, summary: &RunSummary) -> Result<()> {
        let reporter: Box<dyn Reporter> = match self.format {
            Format::Console => Box::new(
                ConsoleReporter::new()
                    .with_colors(!self.no_color)
                    .with_verbose(!self.quiet),
            ),
            Format::Json => Box::new(JsonReporter::new().with_pretty(self.pretty)),
        };
        let stdout = io::stdout();
        let mut out = stdout.lock();
        reporter
            .report(summary, &mut out)
            .context("Failed to write report")?;
        out.flush().context("Failed to write report")?;
        Ok(())
    }
}

/// Arguments for the exec command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Profile files, directories, URLs or compliance://OWNER/NAME references
    #[arg(required = true)]
    pub targets: Vec<String>,

    #[command(flatten)]
    pub options: RunOptions,

    #[command(flatten)]
    pub server: ServerArgs,
}

/// Maps a run to its process exit code. Errors take precedence over
/// failures, failures over skips.
pub fn exit_code(summary: &RunSummary) -> u8 {
    match summary.status() {
        RunStatus::Incomplete => EXIT_INCOMPLETE,
        RunStatus::Failed => EXIT_FAILED,
        RunStatus::Skipped => EXIT_SKIPPED,
        RunStatus::Passed => EXIT_PASSED,
    }
}

/// Parses command-line profile references.
pub fn parse_references(targets: &[String]) -> Result<Vec<ProfileRef>> {
    targets
        .iter()
        .map(|t| ProfileRef::parse(t).with_context(|| format!("Invalid profile reference '{t}'")))
        .collect()
}

/// Runs `references` on this host and returns the summary.
pub fn execute(
    references: &[ProfileRef],
    options: &RunOptions,
    fetcher: Option<Arc<dyn ProfileFetcher>>,
) -> RunSummary {
    let config = options.run_config();
    let mut resolver = Resolver::new();
    if let Some(fetcher) = fetcher {
        resolver = resolver.with_fetcher(fetcher);
    }
    Runner::new(config, Arc::new(LocalBackend::new()))
        .with_resolver(resolver)
        .run(references)
}

/// Runs the exec command.
pub fn run(args: &ExecArgs) -> Result<u8> {
    let references = parse_references(&args.targets)?;
    info!(targets = references.len(), "Executing profiles");

    let fetcher = remote_fetcher(&references, &args.server)?;
    let summary = execute(&references, &args.options, fetcher);
    args.options.report(&summary)?;
    Ok(exit_code(&summary))
}

/// Builds a fetcher when any reference is remote.
///
/// Plain URLs do not need a configured server; without one, remote
/// compliance references are left to fail resolution.
fn remote_fetcher(
    references: &[ProfileRef],
    server: &ServerArgs,
) -> Result<Option<Arc<dyn ProfileFetcher>>> {
    let remotes: Vec<&RemoteRef> = references
        .iter()
        .filter_map(|r| match r {
            ProfileRef::Remote(remote) => Some(remote),
            _ => None,
        })
        .collect();
    if remotes.is_empty() {
        return Ok(None);
    }

    if let Ok(fetcher) = server.fetcher() {
        let fetcher: Arc<dyn ProfileFetcher> = Arc::new(fetcher);
        return Ok(Some(fetcher));
    }

    let origin = remotes.iter().find_map(|r| match r {
        RemoteRef::Url(url) => Some(url.origin().ascii_serialization()),
        RemoteRef::Compliance { .. } => None,
    });
    match origin {
        Some(origin) => {
            let fetcher: Arc<dyn ProfileFetcher> = Arc::new(server.fetcher_for(&origin)?);
            Ok(Some(fetcher))
        }
        None => {
            warn!("No compliance server configured; remote profiles will not resolve");
            Ok(None)
        }
    }
}
