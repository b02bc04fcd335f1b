//! Watch command - run the scheduler until Ctrl-C.

use anyhow::Result;
use clap::Args;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{info, warn};
use tributary_store::Config;
use tributary_sync::Scheduler;

use super::resolve_provider;
use crate::engine::build_orchestrator;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Interval between rounds in seconds (default: `sync.interval_secs`).
    #[arg(long, short)]
    pub interval: Option<u64>,

    /// Restrict to these providers (repeatable).
    #[arg(long, short)]
    pub provider: Vec<String>,

    /// Minimum interval to use.
    #[arg(long, default_value = "10")]
    pub min_interval: u64,
}

/// Runs the watch command.
pub async fn run(args: &WatchArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let providers = args
        .provider
        .iter()
        .map(|name| resolve_provider(name))
        .collect::<Result<Vec<_>, _>>()?;

    let refresh_interval = args
        .interval
        .unwrap_or(config.sync.interval_secs)
        .max(args.min_interval);

    let orchestrator = build_orchestrator(config).await?;
    let mut scheduler =
        Scheduler::new(orchestrator).with_interval(Duration::from_secs(refresh_interval));
    if !providers.is_empty() {
        scheduler = scheduler.with_providers(providers);
    }

    info!(interval = refresh_interval, "Starting watch mode");
    if cli.format == OutputFormat::Text && !cli.quiet {
        println!("Tributary watch mode (every {refresh_interval}s) - press Ctrl+C to stop");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, finishing running jobs"),
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(true);
    });

    let report = scheduler.run(shutdown_rx).await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_scheduler_report(&report));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&report)?);
        }
    }

    Ok(if report.errors > 0 {
        ExitCode::Error
    } else {
        ExitCode::Success
    })
}
