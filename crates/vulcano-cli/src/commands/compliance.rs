//! Compliance command implementation.
//!
//! Lists and runs profiles hosted on a compliance server. Server settings
//! come from the stored configuration file, overridden by flags and
//! environment.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use vulcano_compliance::{BlockingFetcher, ComplianceClient, ComplianceConfig, StoredConfig};
use vulcano_core::{ProfileFetcher, ProfileRef, RemoteRef};

use super::exec::{execute, exit_code, RunOptions};

/// Compliance server connection settings.
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Compliance server URL
    #[arg(long, env = "VULCANO_COMPLIANCE_SERVER")]
    pub server: Option<String>,

    /// User on the compliance server
    #[arg(long, env = "VULCANO_COMPLIANCE_USER")]
    pub user: Option<String>,

    /// Bearer token for the compliance server
    #[arg(long, env = "VULCANO_COMPLIANCE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Compliance configuration file
    #[arg(long = "compliance-config", env = "VULCANO_COMPLIANCE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ServerArgs {
    fn stored(&self) -> Result<(StoredConfig, PathBuf)> {
        let path = self.config.clone().unwrap_or_else(StoredConfig::default_path);
        let stored = StoredConfig::load_from(&path)?.merge(StoredConfig {
            server: self.server.clone(),
            user: self.user.clone(),
            token: self.token.clone(),
            insecure: self.insecure,
            apipath: None,
        });
        Ok((stored, path))
    }

    /// Effective client configuration.
    pub fn client_config(&self) -> Result<ComplianceConfig> {
        let (stored, path) = self.stored()?;
        Ok(stored.into_config(&path)?)
    }

    /// Client for the configured server.
    pub fn client(&self) -> Result<ComplianceClient> {
        Ok(ComplianceClient::new(self.client_config()?)?)
    }

    /// Blocking fetcher for the configured server.
    pub fn fetcher(&self) -> Result<BlockingFetcher> {
        Ok(BlockingFetcher::new(self.client()?)?)
    }

    /// Blocking fetcher that falls back to `server` when none is configured.
    pub fn fetcher_for(&self, server: &str) -> Result<BlockingFetcher> {
        let (mut stored, path) = self.stored()?;
        if stored.server.is_none() {
            stored.server = Some(server.to_string());
        }
        let client = ComplianceClient::new(stored.into_config(&path)?)?;
        Ok(BlockingFetcher::new(client)?)
    }
}

/// Arguments for the compliance command.
#[derive(Args, Debug)]
pub struct ComplianceArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(subcommand)]
    pub command: ComplianceCommand,
}

/// Compliance subcommands.
#[derive(Subcommand, Debug)]
pub enum ComplianceCommand {
    /// List profiles available on the server
    Profiles,

    /// Print the server version
    Version,

    /// Run server profiles on this host
    Exec(ComplianceExecArgs),
}

/// Arguments for `compliance exec`.
#[derive(Args, Debug)]
pub struct ComplianceExecArgs {
    /// Profiles as OWNER/NAME, or NAME for the configured user
    #[arg(required = true)]
    pub profiles: Vec<String>,

    #[command(flatten)]
    pub options: RunOptions,

    /// Upload the run summary to the server
    #[arg(long)]
    pub publish: bool,

    /// Owner to publish results under; defaults to the configured user
    #[arg(long)]
    pub owner: Option<String>,
}

/// Runs the compliance command.
pub fn run(args: &ComplianceArgs) -> Result<u8> {
    match &args.command {
        ComplianceCommand::Profiles => profiles(&args.server),
        ComplianceCommand::Version => version(&args.server),
        ComplianceCommand::Exec(exec) => run_exec(&args.server, exec),
    }
}

fn profiles(server: &ServerArgs) -> Result<u8> {
    let client = server.client()?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    let profiles = rt
        .block_on(client.profiles())
        .context("Failed to list profiles")?;

    if profiles.is_empty() {
        println!("No profiles available on {}", client.config().server);
        return Ok(0);
    }
    println!("Available profiles:");
    println!("===================");
    for profile in &profiles {
        let title = profile.title.as_deref().unwrap_or(&profile.name);
        match &profile.version {
            Some(version) => println!("  * {title} ({}/{}) v{version}", profile.owner, profile.name),
            None => println!("  * {title} ({}/{})", profile.owner, profile.name),
        }
    }
    Ok(0)
}

fn version(server: &ServerArgs) -> Result<u8> {
    let client = server.client()?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    match rt.block_on(client.version()) {
        Ok(version) => {
            println!("Compliance server version: {version}");
            Ok(0)
        }
        Err(e) => {
            info!(error = %e, "Version query failed");
            eprintln!("Could not determine server version.");
            Ok(1)
        }
    }
}

fn run_exec(server: &ServerArgs, args: &ComplianceExecArgs) -> Result<u8> {
    let fetcher = server.fetcher()?;
    let user = fetcher.client().config().user.clone();
    let references = args
        .profiles
        .iter()
        .map(|p| reference(p, user.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    info!(profiles = references.len(), "Executing compliance profiles");

    let fetcher = Arc::new(fetcher);
    let shared: Arc<dyn ProfileFetcher> = Arc::clone(&fetcher) as _;
    let summary = execute(&references, &args.options, Some(shared));
    args.options.report(&summary)?;

    if args.publish {
        let owner = args
            .owner
            .as_deref()
            .or(user.as_deref())
            .context("Publishing needs --owner or a configured user")?;
        fetcher
            .publish(owner, &summary)
            .context("Failed to publish results")?;
        eprintln!("Published run {} to {owner}", summary.run_id);
    }
    Ok(exit_code(&summary))
}

/// Turns `OWNER/NAME` or `NAME` into a compliance reference.
fn reference(profile: &str, user: Option<&str>) -> Result<ProfileRef> {
    let (owner, name) = match profile.split_once('/') {
        Some((owner, name)) => (owner.to_string(), name.to_string()),
        None => (
            user.context("Profile has no owner and no user is configured")?
                .to_string(),
            profile.to_string(),
        ),
    };
    anyhow::ensure!(
        !owner.is_empty() && !name.is_empty() && !name.contains('/'),
        "Invalid profile '{profile}', expected OWNER/NAME"
    );
    Ok(ProfileRef::Remote(RemoteRef::Compliance { owner, name }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_with_owner() {
        let r = reference("admin/ssh", None).unwrap();
        assert_eq!(r.to_string(), "compliance://admin/ssh");
    }

    #[test]
    fn test_reference_defaults_to_user() {
        let r = reference("ssh", Some("alice")).unwrap();
        assert_eq!(r.to_string(), "compliance://alice/ssh");
        assert!(reference("ssh", None).is_err());
        assert!(reference("a/b/c", None).is_err());
    }

    #[test]
    fn test_flags_override_stored_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"server": "https://old.example.com", "user": "admin"}"#).unwrap();

        let args = ServerArgs {
            server: Some("https://new.example.com".to_string()),
            config: Some(path),
            ..ServerArgs::default()
        };
        let config = args.client_config().unwrap();
        assert_eq!(config.server, "https://new.example.com");
        assert_eq!(config.user.as_deref(), Some("admin"));
    }
}
