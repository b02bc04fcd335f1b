//! Cache command - page cache counters and clearing.

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;
use tributary_store::Config;

use crate::engine::build_cache;
use crate::output::{CacheOutput, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands.
#[derive(Subcommand)]
pub enum CacheAction {
    /// Ping the backend and show counters.
    Stats,

    /// Remove entries matching a glob pattern (relative to the key prefix).
    Clear {
        /// Pattern such as `page:youtube:*`; `*` clears everything.
        #[arg(default_value = "*")]
        pattern: String,
    },
}

/// Runs the cache command.
pub async fn run(args: &CacheArgs, cli: &Cli, config: &Config) -> Result<ExitCode> {
    let cache = build_cache(&config.cache);

    match &args.action {
        CacheAction::Stats => {
            cache.ping().await;
            let stats = cache.stats();

            match cli.format {
                OutputFormat::Text => {
                    let formatter = TextFormatter::new(!cli.no_color);
                    println!("{}", formatter.format_cache_stats(&stats, cache.backend_name()));
                }
                OutputFormat::Json => {
                    let formatter = JsonFormatter::new(cli.pretty);
                    let output = CacheOutput {
                        backend: cache.backend_name().to_string(),
                        stats,
                        hit_rate: stats.hit_rate(),
                    };
                    println!("{}", formatter.format(&output)?);
                }
            }
            Ok(ExitCode::Success)
        }
        CacheAction::Clear { pattern } => {
            if !cache.is_enabled() {
                anyhow::bail!("Page cache is not configured (set cache.redis_url)");
            }
            let removed = cache.clear(pattern).await;
            if !cache.is_connected() {
                anyhow::bail!("Cache backend unreachable, nothing was cleared");
            }
            info!(pattern = %pattern, removed, "Cache cleared");

            match cli.format {
                OutputFormat::Text => {
                    let noun = if removed == 1 { "entry" } else { "entries" };
                    println!("Removed {removed} cache {noun}");
                }
                OutputFormat::Json => {
                    let formatter = JsonFormatter::new(cli.pretty);
                    let output = serde_json::json!({ "pattern": pattern, "removed": removed });
                    println!("{}", formatter.format(&output)?);
                }
            }
            Ok(ExitCode::Success)
        }
    }
}
