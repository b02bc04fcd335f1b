//! Provider descriptor system.
//!
//! A descriptor contains all the static configuration for a provider:
//! - Metadata (display name, quota defaults, docs)
//! - CLI names and aliases
//! - A constructor that builds the adapter from configured options

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tributary_core::ProviderKind;
use tributary_fetch::{FetchError, ProviderAdapter};

// ============================================================================
// Provider Options
// ============================================================================

/// Free-form per-provider options from the configuration file
/// (channel id, owner, base id, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    values: BTreeMap<String, String>,
}

impl ProviderOptions {
    /// Creates options from key/value pairs.
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Returns a non-empty option value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns an option or its default.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Returns a required option.
    pub fn require(&self, provider: ProviderKind, key: &str) -> Result<&str, FetchError> {
        self.get(key).ok_or_else(|| {
            FetchError::NotConfigured(format!("{provider}: missing option `{key}`"))
        })
    }

    /// Sets an option (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl From<BTreeMap<String, String>> for ProviderOptions {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self::new(values)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Static facts about a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetadata {
    /// Human-readable name.
    pub display_name: &'static str,
    /// What the provider calls a quota unit.
    pub quota_unit: &'static str,
    /// Daily quota per credential when the config does not say.
    pub default_daily_limit: u64,
    /// Page size when the config does not say.
    pub default_page_size: u32,
    /// Largest page the API accepts.
    pub max_page_size: u32,
    /// Environment variable conventionally holding a token.
    pub token_env_hint: &'static str,
    /// Options the adapter cannot work without.
    pub required_options: &'static [&'static str],
    /// API documentation.
    pub docs_url: &'static str,
}

// ============================================================================
// CLI Config
// ============================================================================

/// CLI naming for a provider.
#[derive(Debug, Clone, Copy)]
pub struct CliConfig {
    /// Primary CLI name.
    pub name: &'static str,
    /// Alternative names.
    pub aliases: &'static [&'static str],
}

// ============================================================================
// Provider Descriptor
// ============================================================================

/// Adapter constructor.
pub type BuildAdapterFn = fn(&ProviderOptions) -> Result<Arc<dyn ProviderAdapter>, FetchError>;

/// Complete descriptor for a provider.
pub struct ProviderDescriptor {
    /// Provider identifier.
    pub id: ProviderKind,
    /// Static metadata.
    pub metadata: ProviderMetadata,
    /// CLI naming.
    pub cli: CliConfig,
    /// Builds the adapter from options.
    pub build_adapter: BuildAdapterFn,
}

impl ProviderDescriptor {
    /// Creates a new descriptor builder.
    pub fn builder(id: ProviderKind) -> ProviderDescriptorBuilder {
        ProviderDescriptorBuilder::new(id)
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        self.metadata.display_name
    }

    /// Returns the CLI name.
    pub fn cli_name(&self) -> &str {
        self.cli.name
    }

    /// Builds the adapter for this provider, checking required options first.
    pub fn build_adapter(
        &self,
        options: &ProviderOptions,
    ) -> Result<Arc<dyn ProviderAdapter>, FetchError> {
        for key in self.metadata.required_options {
            options.require(self.id, key)?;
        }
        (self.build_adapter)(options)
    }

    /// Clamps a requested page size to what the API accepts.
    pub fn clamp_page_size(&self, requested: u32) -> u32 {
        requested.clamp(1, self.metadata.max_page_size)
    }
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("metadata", &self.metadata)
            .field("cli", &self.cli)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for `ProviderDescriptor`.
pub struct ProviderDescriptorBuilder {
    id: ProviderKind,
    metadata: ProviderMetadata,
    cli: CliConfig,
    build_adapter: Option<BuildAdapterFn>,
}

impl ProviderDescriptorBuilder {
    /// Creates a new builder for the given provider.
    pub fn new(id: ProviderKind) -> Self {
        Self {
            id,
            metadata: ProviderMetadata {
                display_name: id.display_name(),
                quota_unit: "requests",
                default_daily_limit: 10_000,
                default_page_size: 50,
                max_page_size: 100,
                token_env_hint: "",
                required_options: &[],
                docs_url: "",
            },
            cli: CliConfig {
                name: id.cli_name(),
                aliases: &[],
            },
            build_adapter: None,
        }
    }

    /// Sets the metadata.
    pub fn metadata(mut self, metadata: ProviderMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the CLI aliases.
    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.cli.aliases = aliases;
        self
    }

    /// Sets the adapter constructor.
    pub fn adapter(mut self, build: BuildAdapterFn) -> Self {
        self.build_adapter = Some(build);
        self
    }

    /// Builds the descriptor.
    pub fn build(self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.id,
            metadata: self.metadata,
            cli: self.cli,
            build_adapter: self.build_adapter.unwrap_or(unsupported),
        }
    }
}

fn unsupported(_: &ProviderOptions) -> Result<Arc<dyn ProviderAdapter>, FetchError> {
    Err(FetchError::NotConfigured(
        "no adapter registered for this provider".to_string(),
    ))
}
