//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;
use tributary_core::{CredentialUsage, ProviderKind};
use tributary_fetch::CacheStats;
use tributary_providers::ProviderDescriptor;
use tributary_store::Config;
use tributary_sync::SyncOutcome;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for one provider's sync request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutput {
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SyncOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Quota rows for one provider.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOutput {
    pub provider: ProviderKind,
    pub unit: String,
    pub available: usize,
    pub credentials: Vec<CredentialUsage>,
}

/// Cache counters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheOutput {
    pub backend: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

/// Provider info output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfoOutput {
    pub id: ProviderKind,
    pub display_name: String,
    pub cli_name: String,
    pub enabled: bool,
    pub credentials: usize,
    pub quota_unit: String,
    pub default_daily_limit: u64,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub token_env_hint: String,
    pub required_options: Vec<String>,
    pub docs_url: String,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a list, unwrapping it when it holds a single item.
    pub fn format_list<T: Serialize>(&self, items: &[T]) -> Result<String> {
        match items {
            [single] => self.format(single),
            _ => self.format(items),
        }
    }

    /// Formats sync results.
    pub fn format_sync_results(
        &self,
        results: &[(ProviderKind, Result<SyncOutcome, String>)],
    ) -> Result<String> {
        let outputs: Vec<SyncOutput> = results
            .iter()
            .map(|(provider, result)| match result {
                Ok(outcome) => SyncOutput {
                    provider: *provider,
                    result: Some(outcome.clone()),
                    error: None,
                },
                Err(e) => SyncOutput {
                    provider: *provider,
                    result: None,
                    error: Some(e.clone()),
                },
            })
            .collect();

        self.format_list(&outputs)
    }

    /// Formats provider list.
    pub fn format_providers(
        &self,
        providers: &[ProviderDescriptor],
        config: &Config,
    ) -> Result<String> {
        let outputs: Vec<ProviderInfoOutput> = providers
            .iter()
            .map(|desc| ProviderInfoOutput {
                id: desc.id,
                display_name: desc.display_name().to_string(),
                cli_name: desc.cli_name().to_string(),
                enabled: config.is_provider_enabled(desc.id),
                credentials: config.provider(desc.id).map_or(0, |p| p.credentials.len()),
                quota_unit: desc.metadata.quota_unit.to_string(),
                default_daily_limit: desc.metadata.default_daily_limit,
                default_page_size: desc.metadata.default_page_size,
                max_page_size: desc.metadata.max_page_size,
                token_env_hint: desc.metadata.token_env_hint.to_string(),
                required_options: desc
                    .metadata
                    .required_options
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                docs_url: desc.metadata.docs_url.to_string(),
            })
            .collect();

        self.format(&outputs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_format_list_unwraps_single_item() {
        let formatter = JsonFormatter::new(false);
        assert_eq!(formatter.format_list(&[1]).unwrap(), "1");
        assert_eq!(formatter.format_list(&[1, 2]).unwrap(), "[1,2]");
    }
}
