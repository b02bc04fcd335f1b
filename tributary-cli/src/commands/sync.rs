//! Sync command - run sync jobs now.

use anyhow::Result;
use clap::{Args, ValueEnum};
use tracing::info;
use tributary_core::SyncMode;
use tributary_store::Config;
use tributary_sync::SyncError;

use super::resolve_provider;
use crate::engine::build_orchestrator;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Sync mode as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ModeArg {
    /// Rescan from the beginning of history.
    Full,
    /// Continue from the saved checkpoint.
    #[default]
    Incremental,
    /// Like incremental, ignoring failure back-off.
    Forced,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => Self::Full,
            ModeArg::Incremental => Self::Incremental,
            ModeArg::Forced => Self::Forced,
        }
    }
}

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    /// Provider to sync, or "all".
    #[arg(default_value = "all")]
    pub provider: String,

    /// Sync mode.
    #[arg(long, short, value_enum, default_value_t = ModeArg::Incremental)]
    pub mode: ModeArg,
}

/// Runs the sync command.
pub async fn run(args: &SyncArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let mode = SyncMode::from(args.mode);
    let single = if args.provider.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(resolve_provider(&args.provider)?)
    };

    let orchestrator = build_orchestrator(config).await?;
    info!(provider = %args.provider, mode = %mode, "Starting sync");

    let results = match single {
        Some(kind) => vec![(kind, orchestrator.run_sync(kind, mode).await)],
        None => {
            if orchestrator.providers().is_empty() {
                anyhow::bail!("No providers configured; add one to the config file");
            }
            orchestrator.sync_all(mode).await
        }
    };

    let mut code = ExitCode::Success;
    for (_, result) in &results {
        code = code.max(match result {
            Ok(outcome) if outcome.is_quota_exhausted() => ExitCode::QuotaExhausted,
            Ok(_) => ExitCode::Success,
            Err(SyncError::NotConfigured(_)) => ExitCode::UnknownProvider,
            Err(_) => ExitCode::Error,
        });
    }

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = results
                .iter()
                .map(|(kind, result)| match result {
                    Ok(outcome) => formatter.format_outcome(*kind, outcome),
                    Err(e) => formatter.format_error(kind.display_name(), &e.to_string()),
                })
                .collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let results: Vec<_> = results
                .into_iter()
                .map(|(kind, result)| (kind, result.map_err(|e| e.to_string())))
                .collect();
            println!("{}", formatter.format_sync_results(&results)?);
        }
    }

    Ok(code)
}
