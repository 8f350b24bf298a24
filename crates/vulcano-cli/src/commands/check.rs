//! Check command implementation.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::json;
use tracing::info;

use vulcano_core::{LocalBackend, MockBackend};
use vulcano_runner::{CheckReport, RunConfig, Runner};

use super::exec::{parse_references, Format};

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Profile files or directories
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "console")]
    pub format: Format,

    /// Evaluate without reading this host
    #[arg(long = "static")]
    pub static_only: bool,

    /// Line number of the first line of each profile
    #[arg(long, default_value = "1")]
    pub line_offset: usize,
}

/// Runs the check command.
pub fn run(args: &CheckArgs) -> Result<u8> {
    let references = parse_references(&args.paths)?;
    info!(paths = references.len(), static_only = args.static_only, "Checking profiles");

    let config = RunConfig::new()
        .with_line_offset(args.line_offset)
        .with_eager_resources(!args.static_only);
    let runner = if args.static_only {
        Runner::new(config, Arc::new(MockBackend::new()))
    } else {
        Runner::new(config, Arc::new(LocalBackend::new()))
    };
    let report = runner.check(&references);

    match args.format {
        Format::Console => print_console(&report),
        Format::Json => print_json(&report)?,
    }
    Ok(if report.is_valid() { 0 } else { 1 })
}

fn print_console(report: &CheckReport) {
    println!("Valid: {}", report.is_valid());
    println!("Profiles: {}", report.profiles.len());
    println!("Rules: {}", report.rules);

    if !report.errors.is_empty() {
        println!("\nErrors:");
        for error in &report.errors {
            println!("  ✗ {error}");
        }
    }

    if !report.violations.is_empty() {
        println!("\nFindings:");
        for (source, v) in &report.violations {
            let location = v
                .line
                .map_or_else(|| source.clone(), |line| format!("{source}:{line}"));
            println!("  [{}] {} {location}: {}", v.severity.as_str(), v.lint, v.message);
            if let Some(suggestion) = &v.suggestion {
                println!("      hint: {suggestion}");
            }
        }
    }
}

fn print_json(report: &CheckReport) -> Result<()> {
    let violations: Vec<_> = report
        .violations
        .iter()
        .map(|(source, v)| json!({"source": source, "violation": v}))
        .collect();
    let doc = json!({
        "valid": report.is_valid(),
        "profiles": report.profiles,
        "rules": report.rules,
        "errors": report.errors,
        "violations": violations,
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
