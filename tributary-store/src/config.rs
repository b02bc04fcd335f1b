//! Configuration management.
//!
//! The configuration file is JSON by default; a `.yaml`/`.yml` extension
//! selects YAML. A missing file yields the defaults.
//!
//! ```yaml
//! cache:
//!   redis_url: redis://127.0.0.1:6379
//! providers:
//!   youtube:
//!     daily_limit: 10000
//!     options: { channel_id: UC_x5XG1OV2P6uZZ5FSM9Ttw }
//!     credentials:
//!       - { id: primary, env: YOUTUBE_API_KEY }
//!       - { id: backup, keychain_account: backup }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tributary_core::ProviderKind;
use tributary_fetch::KeychainApi;

use crate::error::StoreError;
use crate::persistence::{default_config_path, default_data_dir};
use crate::rotator::PooledCredential;

// ============================================================================
// Config
// ============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Cache backend settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Sync engine settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Content store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Provider configurations keyed by CLI name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level used when no `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for ledgers, checkpoints, history and the content db.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: None,
        }
    }
}

/// Cache backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether to use the cache at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Redis URL; no URL means no cache (pass-through).
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Prefix for every key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per-command timeout in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            key_prefix: default_key_prefix(),
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Connection timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-command timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Records per page when the provider config does not say.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Attempts per page fetch (1 = no retry).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay in milliseconds.
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
    /// Upper bound for retry delays in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Timeout for a single provider request in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Consecutive failures tolerated before non-forced syncs back off.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long back-off lasts after the last failure, in seconds.
    #[serde(default = "default_backoff_window_secs")]
    pub backoff_window_secs: u64,
    /// Fraction of the daily limit at which a credential is blocked.
    #[serde(default = "default_soft_limit_ratio")]
    pub soft_limit_ratio: f64,
    /// Safety stop for a single run.
    #[serde(default = "default_max_pages_per_run")]
    pub max_pages_per_run: u32,
    /// Scheduler interval in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            backoff_window_secs: default_backoff_window_secs(),
            soft_limit_ratio: default_soft_limit_ratio(),
            max_pages_per_run: default_max_pages_per_run(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Content store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path; defaults to `<data_dir>/content.db`.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether this provider is synced.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Daily quota per credential; defaults to the provider's documented limit.
    #[serde(default)]
    pub daily_limit: Option<u64>,
    /// Records per page.
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Credentials in rotation order.
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
    /// Adapter options (channel id, owner, base id, ...).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_limit: None,
            page_size: None,
            credentials: Vec::new(),
            options: BTreeMap::new(),
        }
    }
}

/// Where to find one credential's token.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Stable credential id (ledger key).
    pub id: String,
    /// Environment variable holding the token.
    #[serde(default)]
    pub env: Option<String>,
    /// Keychain account under service `tributary:<provider>`.
    #[serde(default)]
    pub keychain_account: Option<String>,
    /// Inline token. Discouraged; prefer `env` or the keychain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-credential daily limit override.
    #[serde(default)]
    pub daily_limit: Option<u64>,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("id", &self.id)
            .field("env", &self.env)
            .field("keychain_account", &self.keychain_account)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("daily_limit", &self.daily_limit)
            .finish()
    }
}

impl CredentialConfig {
    /// Resolves the token: environment first, then keychain, then inline.
    pub async fn resolve_token(
        &self,
        provider: ProviderKind,
        keychain: &dyn KeychainApi,
    ) -> Option<String> {
        if let Some(var) = &self.env {
            match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => return Some(value.trim().to_string()),
                _ => debug!(provider = %provider, credential = %self.id, env = %var, "Env var not set"),
            }
        }

        if let Some(account) = &self.keychain_account {
            match keychain.token(provider, account).await {
                Ok(Some(secret)) => return Some(secret),
                Ok(None) => {
                    debug!(provider = %provider, credential = %self.id, "No keychain entry");
                }
                Err(e) => {
                    warn!(provider = %provider, credential = %self.id, error = %e, "Keychain lookup failed");
                }
            }
        }

        self.token
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_key_prefix() -> String {
    "tributary:".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_command_timeout_ms() -> u64 {
    500
}

fn default_page_size() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_retry_delay_ms() -> u64 {
    500
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_backoff_window_secs() -> u64 {
    3_600
}

fn default_soft_limit_ratio() -> f64 {
    0.9
}

fn default_max_pages_per_run() -> u32 {
    1_000
}

fn default_interval_secs() -> u64 {
    900
}

// ============================================================================
// Loading and Saving
// ============================================================================

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content, is_yaml(path))?;

        info!(path = %path.display(), providers = config.providers.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses configuration text.
    pub fn parse(content: &str, yaml: bool) -> Result<Self, StoreError> {
        if yaml {
            Ok(serde_yaml::from_str(content)?)
        } else {
            Ok(serde_json::from_str(content)?)
        }
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Data directory (configured or platform default).
    pub fn data_dir(&self) -> PathBuf {
        self.general.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// SQLite content database path.
    pub fn sqlite_path(&self) -> PathBuf {
        self.store
            .sqlite_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("content.db"))
    }

    /// Directory for per-provider quota ledgers.
    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir().join("ledger")
    }

    /// Checkpoint file.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir().join("checkpoints.json")
    }

    /// Job history file.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir().join("history.json")
    }

    /// Returns a provider's configuration.
    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(kind.cli_name())
    }

    /// Returns whether a provider is configured and enabled.
    pub fn is_provider_enabled(&self, kind: ProviderKind) -> bool {
        self.provider(kind).is_some_and(|p| p.enabled)
    }

    /// Configured and enabled providers, in canonical order.
    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::all()
            .iter()
            .copied()
            .filter(|k| self.is_provider_enabled(*k))
            .collect()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), StoreError> {
        let sync = &self.sync;
        if sync.page_size == 0 {
            return Err(StoreError::Config("sync.page_size must be > 0".into()));
        }
        if !(sync.soft_limit_ratio > 0.0 && sync.soft_limit_ratio <= 1.0) {
            return Err(StoreError::Config(format!(
                "sync.soft_limit_ratio must be in (0, 1], got {}",
                sync.soft_limit_ratio
            )));
        }
        if sync.max_retries == 0 {
            return Err(StoreError::Config("sync.max_retries must be >= 1".into()));
        }
        if sync.max_pages_per_run == 0 {
            return Err(StoreError::Config(
                "sync.max_pages_per_run must be > 0".into(),
            ));
        }

        for (name, provider) in &self.providers {
            let Some(kind) = ProviderKind::from_cli_name(name) else {
                return Err(StoreError::Config(format!("unknown provider `{name}`")));
            };
            if provider.page_size == Some(0) {
                return Err(StoreError::Config(format!("{kind}: page_size must be > 0")));
            }
            if provider.daily_limit == Some(0) {
                return Err(StoreError::Config(format!(
                    "{kind}: daily_limit must be > 0"
                )));
            }
            if provider.enabled && provider.credentials.is_empty() {
                return Err(StoreError::Config(format!(
                    "{kind}: enabled but no credentials configured"
                )));
            }

            let mut seen = HashSet::new();
            for cred in &provider.credentials {
                if cred.id.trim().is_empty() {
                    return Err(StoreError::Config(format!("{kind}: credential with empty id")));
                }
                if !seen.insert(cred.id.as_str()) {
                    return Err(StoreError::Config(format!(
                        "{kind}: duplicate credential id `{}`",
                        cred.id
                    )));
                }
                if cred.env.is_none() && cred.keychain_account.is_none() && cred.token.is_none() {
                    return Err(StoreError::Config(format!(
                        "{kind}: credential `{}` has no env, keychain_account or token",
                        cred.id
                    )));
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Credential Pools
    // ========================================================================

    /// Resolves credential tokens for every enabled provider.
    ///
    /// `default_limit` supplies the provider's documented daily limit when
    /// neither the credential nor the provider config sets one. Credentials
    /// whose token cannot be found are left out with a warning.
    pub async fn credential_pools(
        &self,
        keychain: &dyn KeychainApi,
        default_limit: impl Fn(ProviderKind) -> u64,
    ) -> HashMap<ProviderKind, Vec<PooledCredential>> {
        let mut pools = HashMap::new();

        for kind in self.enabled_providers() {
            let Some(provider) = self.provider(kind) else {
                continue;
            };
            let mut pool = Vec::with_capacity(provider.credentials.len());
            for cred in &provider.credentials {
                match cred.resolve_token(kind, keychain).await {
                    Some(token) => pool.push(PooledCredential {
                        id: cred.id.clone(),
                        token,
                        daily_limit: cred
                            .daily_limit
                            .or(provider.daily_limit)
                            .unwrap_or_else(|| default_limit(kind)),
                    }),
                    None => {
                        warn!(provider = %kind, credential = %cred.id, "No token found, credential skipped");
                    }
                }
            }
            pools.insert(kind, pool);
        }

        pools
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tributary_fetch::MemoryKeychain;

    const YAML: &str = r"
sync:
  page_size: 25
providers:
  youtube:
    daily_limit: 10000
    options:
      channel_id: UC1
    credentials:
      - id: primary
        env: TRIBUTARY_TEST_UNSET_VAR
        keychain_account: primary
      - id: inline
        token: inline-token
";

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.page_size, 50);
        assert!((config.sync.soft_limit_ratio - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.cache.key_prefix, "tributary:");
        assert!(config.enabled_providers().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::parse(YAML, true).unwrap();
        assert_eq!(config.sync.page_size, 25);
        assert_eq!(config.sync.failure_threshold, 3);
        let yt = config.provider(ProviderKind::YouTube).unwrap();
        assert_eq!(yt.options["channel_id"], "UC1");
        assert_eq!(yt.credentials.len(), 2);
        assert_eq!(config.enabled_providers(), vec![ProviderKind::YouTube]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_json() {
        let config = Config::parse(
            r#"{"providers": {"github": {"enabled": false}}}"#,
            false,
        )
        .unwrap();
        assert!(!config.is_provider_enabled(ProviderKind::GitHub));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = Config::default();
        config.sync.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sync.soft_limit_ratio = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config
            .providers
            .insert("youtube".into(), ProviderConfig::default());
        assert!(config.validate().is_err(), "enabled without credentials");

        let mut config = Config::default();
        config.providers.insert("myspace".into(), ProviderConfig::default());
        assert!(config.validate().is_err(), "unknown provider");

        let mut config = Config::parse(YAML, true).unwrap();
        if let Some(p) = config.providers.get_mut("youtube") {
            p.credentials[1].id = "primary".into();
        }
        assert!(config.validate().is_err(), "duplicate id");
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let cred = CredentialConfig {
            id: "x".into(),
            token: Some("secret".into()),
            ..Default::default()
        };
        assert!(!format!("{cred:?}").contains("secret"));
    }

    #[tokio::test]
    async fn test_credential_pools_resolution_order() {
        let config = Config::parse(YAML, true).unwrap();
        let keychain = MemoryKeychain::with_tokens([(ProviderKind::YouTube, "primary", "from-keychain")]);

        let pools = config.credential_pools(&keychain, |_| 1).await;
        let pool = &pools[&ProviderKind::YouTube];

        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].id, "primary");
        assert_eq!(pool[0].token, "from-keychain");
        assert_eq!(pool[0].daily_limit, 10_000);
        assert_eq!(pool[1].token, "inline-token");
    }

    #[tokio::test]
    async fn test_unresolvable_credential_skipped() {
        let config = Config::parse(YAML, true).unwrap();
        let pools = config
            .credential_pools(&MemoryKeychain::new(), |_| 1)
            .await;
        let pool = &pools[&ProviderKind::YouTube];
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, "inline");
    }

    #[test]
    fn test_save_and_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config::parse(YAML, true).unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sync.page_size, 25);
        assert!(loaded.provider(ProviderKind::YouTube).is_some());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load_from(Path::new("/nonexistent/tributary.json")).unwrap();
        assert!(config.providers.is_empty());
    }
}
