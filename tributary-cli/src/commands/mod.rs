//! CLI command implementations.

pub mod cache;
pub mod config;
pub mod providers;
pub mod quota;
pub mod status;
pub mod sync;
pub mod watch;

use thiserror::Error;
use tributary_core::ProviderKind;
use tributary_providers::ProviderRegistry;

/// A provider name that matches nothing in the registry.
#[derive(Debug, Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

/// Resolves a CLI name or alias.
pub fn resolve_provider(name: &str) -> Result<ProviderKind, UnknownProvider> {
    ProviderRegistry::get_by_cli_name(name)
        .map(|desc| desc.id)
        .ok_or_else(|| UnknownProvider(name.to_string()))
}

/// Resolves an optional provider argument; `None` and `"all"` mean every
/// provider in `available`.
pub fn resolve_targets(
    name: Option<&str>,
    available: Vec<ProviderKind>,
) -> Result<Vec<ProviderKind>, UnknownProvider> {
    match name {
        None => Ok(available),
        Some(n) if n.eq_ignore_ascii_case("all") => Ok(available),
        Some(n) => resolve_provider(n).map(|kind| vec![kind]),
    }
}
