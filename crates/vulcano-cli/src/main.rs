//! Vulcano CLI - Command-line interface for the Vulcano compliance engine.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// Exit code for fatal errors and usage errors.
const EXIT_FATAL: u8 = 1;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Reports go to stdout; logs stay on stderr.
    let filter = cli.log_level.as_deref().map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        EnvFilter::new,
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Exec(args) => commands::exec::run(&args),
        Commands::Check(args) => commands::check::run(&args),
        Commands::Detect => commands::detect::run(),
        Commands::Compliance(args) => commands::compliance::run(&args),
        Commands::Version => {
            println!("vulcano {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
