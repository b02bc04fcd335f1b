//! Quota command - credential usage per provider.

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;
use tributary_core::{CredentialUsage, ProviderKind};
use tributary_providers::ProviderRegistry;
use tributary_store::Config;

use super::{resolve_provider, resolve_targets};
use crate::engine::build_orchestrator;
use crate::output::{JsonFormatter, QuotaOutput, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the quota command.
#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct QuotaArgs {
    #[command(subcommand)]
    pub action: Option<QuotaAction>,

    /// Provider to show (default: all enabled).
    pub provider: Option<String>,
}

/// Quota subcommands.
#[derive(Subcommand)]
pub enum QuotaAction {
    /// Clear today's usage and blocks for a provider.
    Reset {
        /// Provider to reset.
        provider: String,
    },
}

/// Runs the quota command.
pub async fn run(args: &QuotaArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let (targets, reset) = match &args.action {
        Some(QuotaAction::Reset { provider }) => (vec![resolve_provider(provider)?], true),
        None => (
            resolve_targets(args.provider.as_deref(), config.enabled_providers())?,
            false,
        ),
    };

    let orchestrator = build_orchestrator(config).await?;

    let mut outputs = Vec::with_capacity(targets.len());
    for kind in targets {
        let usage = if reset {
            let usage = orchestrator.reset_quota(kind).await?;
            info!(provider = %kind, "Quota reset");
            usage
        } else {
            orchestrator.get_quota_status(kind).await?
        };
        outputs.push(quota_output(kind, usage));
    }

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            if outputs.is_empty() {
                println!("No providers configured");
            }
            let blocks: Vec<String> = outputs
                .iter()
                .map(|o| formatter.format_quota(o.provider, &o.credentials, &o.unit))
                .collect();
            println!("{}", blocks.join("\n\n"));
            if reset {
                println!();
                println!("Quota reset");
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_list(&outputs)?);
        }
    }

    Ok(ExitCode::Success)
}

fn quota_output(provider: ProviderKind, credentials: Vec<CredentialUsage>) -> QuotaOutput {
    QuotaOutput {
        provider,
        unit: ProviderRegistry::get(provider)
            .map_or("units", |d| d.metadata.quota_unit)
            .to_string(),
        available: credentials.iter().filter(|c| !c.blocked).count(),
        credentials,
    }
}
