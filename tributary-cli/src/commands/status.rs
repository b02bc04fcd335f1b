//! Status command - checkpoints, running jobs and back-off.

use anyhow::Result;
use clap::Args;
use tributary_store::Config;

use super::resolve_targets;
use crate::engine::build_orchestrator;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Provider to show (default: all configured).
    pub provider: Option<String>,

    /// Also list this many recent jobs per provider.
    #[arg(long, default_value = "0")]
    pub history: usize,
}

/// Runs the status command.
pub async fn run(args: &StatusArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let orchestrator = build_orchestrator(config).await?;
    let targets = resolve_targets(args.provider.as_deref(), orchestrator.providers())?;

    let mut statuses = Vec::with_capacity(targets.len());
    for kind in targets {
        statuses.push(orchestrator.get_sync_status(kind).await?);
    }

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            if statuses.is_empty() {
                println!("No providers configured");
            }
            for (i, status) in statuses.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("{}", formatter.format_status(status));
                if args.history > 0 {
                    for job in orchestrator.recent_jobs(status.provider, args.history).await {
                        println!();
                        println!("{}", formatter.format_job(&job));
                    }
                }
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            if args.history > 0 {
                let mut jobs = Vec::new();
                for status in &statuses {
                    jobs.extend(orchestrator.recent_jobs(status.provider, args.history).await);
                }
                let output = serde_json::json!({ "status": statuses, "history": jobs });
                println!("{}", formatter.format(&output)?);
            } else {
                println!("{}", formatter.format_list(&statuses)?);
            }
        }
    }

    Ok(ExitCode::Success)
}
