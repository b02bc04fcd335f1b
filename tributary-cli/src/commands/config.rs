//! Config command - manage configuration.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;
use tributary_store::{Config, default_config_dir};

use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration (inline tokens redacted).
    Show,

    /// Show configuration and data paths.
    Path,

    /// Check the configuration for errors.
    Validate,

    /// Write a default configuration file if none exists.
    Init,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli, config: &Config, path: &Path) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli, config),
        ConfigAction::Path => show_paths(cli, config, path),
        ConfigAction::Validate => validate_config(cli, config, path),
        ConfigAction::Init => init_config(path),
    }
}

/// Copy of the config safe to print.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    for provider in config.providers.values_mut() {
        for cred in &mut provider.credentials {
            if cred.token.is_some() {
                cred.token = Some("<redacted>".to_string());
            }
        }
    }
    config
}

fn show_config(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let config = redacted(config);

    match cli.format {
        OutputFormat::Text => {
            println!("Tributary Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Data dir:        {}", config.data_dir().display());
            println!(
                "Cache:           {}",
                match (&config.cache.redis_url, config.cache.enabled) {
                    (Some(url), true) => url.as_str(),
                    _ => "disabled",
                }
            );
            println!("Page size:       {}", config.sync.page_size);
            println!("Max retries:     {}", config.sync.max_retries);
            println!(
                "Back-off:        after {} failures, for {}s",
                config.sync.failure_threshold, config.sync.backoff_window_secs
            );
            println!("Soft limit:      {:.0}%", config.sync.soft_limit_ratio * 100.0);
            println!("Watch interval:  {}s", config.sync.interval_secs);
            println!();
            println!("Providers:");
            if config.providers.is_empty() {
                println!("  (none)");
            }
            for (name, provider) in &config.providers {
                let ids: Vec<&str> = provider.credentials.iter().map(|c| c.id.as_str()).collect();
                println!(
                    "  • {name}{} - credentials: {}",
                    if provider.enabled { "" } else { " (disabled)" },
                    if ids.is_empty() { "none".to_string() } else { ids.join(", ") }
                );
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(ExitCode::Success)
}

fn show_paths(cli: &Cli, config: &Config, path: &Path) -> Result<ExitCode> {
    let config_dir = default_config_dir();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Config file:   {}", path.display());
            println!("Data dir:      {}", config.data_dir().display());
            println!("Content db:    {}", config.sqlite_path().display());
            println!("Ledgers:       {}", config.ledger_dir().display());
            println!("Checkpoints:   {}", config.checkpoint_path().display());
            println!("History:       {}", config.history_path().display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": path.display().to_string(),
                "data_dir": config.data_dir().display().to_string(),
                "content_db": config.sqlite_path().display().to_string(),
                "ledger_dir": config.ledger_dir().display().to_string(),
                "checkpoints": config.checkpoint_path().display().to_string(),
                "history": config.history_path().display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(ExitCode::Success)
}

fn validate_config(cli: &Cli, config: &Config, path: &Path) -> Result<ExitCode> {
    let result = config.validate();

    match cli.format {
        OutputFormat::Text => match &result {
            Ok(()) => println!("{} is valid", path.display()),
            Err(e) => println!("{} is invalid: {e}", path.display()),
        },
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": path.display().to_string(),
                "valid": result.is_ok(),
                "error": result.as_ref().err().map(ToString::to_string),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(if result.is_ok() {
        ExitCode::Success
    } else {
        ExitCode::Error
    })
}

fn init_config(path: &Path) -> Result<ExitCode> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    Config::default().save_to(path)?;
    info!(path = %path.display(), "Configuration created");
    println!("Wrote default configuration to {}", path.display());
    Ok(ExitCode::Success)
}
