// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Tributary CLI - checkpointed content ingestion from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Incremental sync of one provider
//! tributary sync youtube
//!
//! # Full rescan of every configured provider
//! tributary sync all --mode full
//!
//! # Where each provider stands
//! tributary status
//!
//! # Credential usage, JSON output
//! tributary quota youtube --format json --pretty
//!
//! # Poll every 5 minutes until Ctrl-C
//! tributary watch --interval 300
//! ```

mod commands;
mod engine;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tributary_store::Config;
use tributary_sync::SyncError;

use commands::{UnknownProvider, cache, config, providers, quota, status, sync, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// Tributary CLI - rate-limited content ingestion.
#[derive(Parser)]
#[command(name = "tributary")]
#[command(about = "Checkpointed, quota-aware content sync CLI")]
#[command(long_about = r"
Tributary pulls content from third-party APIs into one local store,
rotating API credentials before their daily quota runs out and resuming
every provider where the previous run stopped.

Supported providers:
  • YouTube (youtube)
  • GitHub (github)
  • Airtable (airtable)
  • Mailchimp (mailchimp)

Examples:
  tributary sync youtube              # Incremental sync
  tributary sync all --mode full      # Rescan everything
  tributary status                    # Checkpoints and running jobs
  tributary quota reset youtube       # Clear today's usage
  tributary watch --interval 300      # Poll until Ctrl-C
")]
#[command(version)]
#[command(author = "Tributary Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (JSON, or YAML with a .yaml/.yml extension).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run a sync job now.
    #[command(visible_alias = "s")]
    Sync(sync::SyncArgs),

    /// Show checkpoints, running jobs and back-off state.
    #[command(visible_alias = "st")]
    Status(status::StatusArgs),

    /// Show or reset credential quota usage.
    #[command(visible_alias = "q")]
    Quota(quota::QuotaArgs),

    /// Inspect or clear the page cache.
    Cache(cache::CacheArgs),

    /// List available providers.
    #[command(visible_alias = "p")]
    Providers,

    /// Start incremental syncs on an interval until Ctrl-C.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Provider unknown or not configured.
    UnknownProvider = 2,
    /// A sync stopped because every credential ran out of quota.
    QuotaExhausted = 3,
}

impl ExitCode {
    /// The worse of two codes.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other as i32 > self as i32 { other } else { self }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: &str) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("tributary=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("tributary={level}")))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let loaded = Config::load_from(&config_path);
    let level = loaded
        .as_ref()
        .map_or("warn", |c| c.general.log_level.as_str());
    setup_logging(cli.verbose, cli.quiet, level);

    let result = match loaded {
        Ok(config) => run(&cli, &config, &config_path).await,
        Err(e) => Err(anyhow::Error::new(e).context(format!(
            "Failed to load configuration from {}",
            config_path.display()
        ))),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            exit_code_for(&e)
        }
    };

    if code != ExitCode::Success {
        std::process::exit(code as i32);
    }
    Ok(())
}

async fn run(cli: &Cli, config: &Config, config_path: &std::path::Path) -> Result<ExitCode> {
    match &cli.command {
        Commands::Sync(args) => sync::run(args, cli, config).await,
        Commands::Status(args) => status::run(args, cli, config).await,
        Commands::Quota(args) => quota::run(args, cli, config).await,
        Commands::Cache(args) => cache::run(args, cli, config).await,
        Commands::Providers => providers::run(cli, config),
        Commands::Watch(args) => watch::run(args, cli, config).await,
        Commands::Config(args) => config::run(args, cli, config, config_path),
    }
}

/// Maps an error to its exit code.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if err.downcast_ref::<UnknownProvider>().is_some() {
        return ExitCode::UnknownProvider;
    }
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::NotConfigured(_)) => ExitCode::UnknownProvider,
        _ => ExitCode::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tributary_core::ProviderKind;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_with_mode() {
        let cli = Cli::parse_from(["tributary", "sync", "youtube", "--mode", "full"]);
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.provider, "youtube");
                assert_eq!(args.mode, sync::ModeArg::Full);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_parse_quota_reset() {
        let cli = Cli::parse_from(["tributary", "quota", "reset", "github"]);
        let Commands::Quota(args) = cli.command else {
            panic!("expected quota");
        };
        assert!(matches!(
            args.action,
            Some(quota::QuotaAction::Reset { ref provider }) if provider == "github"
        ));
    }

    #[test]
    fn test_parse_quota_for_provider() {
        let cli = Cli::parse_from(["tributary", "quota", "youtube", "-f", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
        let Commands::Quota(args) = cli.command else {
            panic!("expected quota");
        };
        assert!(args.action.is_none());
        assert_eq!(args.provider.as_deref(), Some("youtube"));
    }

    #[test]
    fn test_exit_codes() {
        let unknown = anyhow::Error::new(UnknownProvider("vimeo".into()));
        assert_eq!(exit_code_for(&unknown), ExitCode::UnknownProvider);

        let not_configured = anyhow::Error::new(SyncError::NotConfigured(ProviderKind::GitHub));
        assert_eq!(exit_code_for(&not_configured), ExitCode::UnknownProvider);

        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), ExitCode::Error);
        assert_eq!(ExitCode::Success as i32, 0);
        assert_eq!(ExitCode::QuotaExhausted as i32, 3);
        assert_eq!(
            ExitCode::QuotaExhausted.max(ExitCode::Error),
            ExitCode::QuotaExhausted
        );
    }
}
