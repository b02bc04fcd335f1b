//! Providers command - list available providers.

use anyhow::Result;
use tracing::info;
use tributary_providers::ProviderRegistry;
use tributary_store::Config;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the providers command.
pub fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    info!("Listing providers");

    let providers = ProviderRegistry::all();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_providers_header());
            println!("{}", "─".repeat(70));

            for desc in providers {
                let credentials = config.provider(desc.id).map_or(0, |p| p.credentials.len());
                println!(
                    "{}",
                    formatter.format_provider_line(
                        desc,
                        config.is_provider_enabled(desc.id),
                        credentials
                    )
                );
            }

            println!();
            println!(
                "Total: {} providers ({} enabled)",
                providers.len(),
                config.enabled_providers().len()
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_providers(providers, config)?);
        }
    }

    Ok(ExitCode::Success)
}
