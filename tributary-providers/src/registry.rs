//! Provider registry for managing all provider descriptors.
//!
//! The registry provides static access to all provider configurations
//! and is the central point for looking up providers.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tributary_core::ProviderKind;
use tributary_fetch::{FetchError, ProviderAdapter};

use crate::airtable::airtable_descriptor;
use crate::descriptor::{ProviderDescriptor, ProviderOptions};
use crate::github::github_descriptor;
use crate::mailchimp::mailchimp_descriptor;
use crate::youtube::youtube_descriptor;

// ============================================================================
// Static Registry
// ============================================================================

/// Static storage for all provider descriptors.
static DESCRIPTORS: OnceLock<Vec<ProviderDescriptor>> = OnceLock::new();

/// Static storage for CLI name to provider kind mapping.
static CLI_NAME_MAP: OnceLock<HashMap<String, ProviderKind>> = OnceLock::new();

/// Initializes all provider descriptors, reference adapter first.
fn init_descriptors() -> Vec<ProviderDescriptor> {
    vec![
        youtube_descriptor(),
        github_descriptor(),
        airtable_descriptor(),
        mailchimp_descriptor(),
    ]
}

/// Builds the CLI name to provider kind mapping.
fn build_cli_name_map(descriptors: &[ProviderDescriptor]) -> HashMap<String, ProviderKind> {
    let mut map = HashMap::new();

    for desc in descriptors {
        map.insert(desc.cli.name.to_string(), desc.id);
        for alias in desc.cli.aliases {
            map.insert((*alias).to_string(), desc.id);
        }
    }

    map
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Global registry of all provider descriptors.
///
/// The registry is initialized lazily on first access and provides
/// thread-safe access to provider configurations.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Returns all provider descriptors.
    pub fn all() -> &'static [ProviderDescriptor] {
        DESCRIPTORS.get_or_init(init_descriptors)
    }

    /// Gets a provider descriptor by kind.
    pub fn get(id: ProviderKind) -> Option<&'static ProviderDescriptor> {
        Self::all().iter().find(|d| d.id == id)
    }

    /// Returns the CLI name to provider kind mapping.
    pub fn cli_name_map() -> &'static HashMap<String, ProviderKind> {
        CLI_NAME_MAP.get_or_init(|| build_cli_name_map(Self::all()))
    }

    /// Looks up a provider by CLI name or alias (case-insensitive).
    pub fn get_by_cli_name(name: &str) -> Option<&'static ProviderDescriptor> {
        let kind = Self::cli_name_map().get(&name.trim().to_lowercase())?;
        Self::get(*kind)
    }

    /// Returns the number of registered providers.
    pub fn count() -> usize {
        Self::all().len()
    }

    /// Returns all provider kinds.
    pub fn kinds() -> Vec<ProviderKind> {
        Self::all().iter().map(|d| d.id).collect()
    }

    /// Builds the adapter for a provider.
    pub fn build_adapter(
        kind: ProviderKind,
        options: &ProviderOptions,
    ) -> Result<Arc<dyn ProviderAdapter>, FetchError> {
        let desc = Self::get(kind).ok_or_else(|| {
            FetchError::NotConfigured(format!("no descriptor registered for {kind}"))
        })?;
        desc.build_adapter(options)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_kind() {
        assert_eq!(ProviderRegistry::count(), ProviderKind::all().len());
        for kind in ProviderKind::all() {
            let desc = ProviderRegistry::get(*kind);
            assert!(desc.is_some(), "Should find provider {kind:?}");
            assert_eq!(desc.unwrap().id, *kind);
        }
    }

    #[test]
    fn test_cli_name_lookup() {
        assert_eq!(
            ProviderRegistry::get_by_cli_name("youtube").unwrap().id,
            ProviderKind::YouTube
        );
        assert_eq!(
            ProviderRegistry::get_by_cli_name("GH").unwrap().id,
            ProviderKind::GitHub
        );
        assert_eq!(
            ProviderRegistry::get_by_cli_name("mc").unwrap().id,
            ProviderKind::Mailchimp
        );
        assert!(ProviderRegistry::get_by_cli_name("myspace").is_none());
    }

    #[test]
    fn test_reference_adapter_first() {
        assert_eq!(ProviderRegistry::kinds()[0], ProviderKind::YouTube);
    }

    #[test]
    fn test_build_adapter_checks_required_options() {
        let err = ProviderRegistry::build_adapter(ProviderKind::Airtable, &ProviderOptions::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("base_id"));

        let adapter = ProviderRegistry::build_adapter(
            ProviderKind::GitHub,
            &ProviderOptions::default().with("owner", "rust-lang"),
        )
        .unwrap();
        assert_eq!(adapter.kind(), ProviderKind::GitHub);
    }

    #[test]
    fn test_page_sizes_within_api_limits() {
        for desc in ProviderRegistry::all() {
            assert!(desc.metadata.default_page_size <= desc.metadata.max_page_size);
            assert!(desc.metadata.default_daily_limit > 0);
        }
    }
}
