//! Provider-related types.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported content provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// YouTube Data API (videos)
    YouTube,
    /// GitHub REST API (repositories)
    GitHub,
    /// Airtable API (table records)
    Airtable,
    /// Mailchimp Marketing API (campaigns)
    Mailchimp,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::GitHub => "GitHub",
            Self::Airtable => "Airtable",
            Self::Mailchimp => "Mailchimp",
        }
    }

    /// Returns all available provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[Self::YouTube, Self::GitHub, Self::Airtable, Self::Mailchimp]
    }

    /// Returns the CLI name for this provider (lowercase, no spaces).
    ///
    /// This is also the namespace used for cache keys, ledger files and
    /// the `provider` column of the content store.
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::GitHub => "github",
            Self::Airtable => "airtable",
            Self::Mailchimp => "mailchimp",
        }
    }

    /// Looks up a provider by its CLI name (case-insensitive).
    pub fn from_cli_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::all().iter().copied().find(|p| p.cli_name() == name)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_name_roundtrip() {
        for kind in ProviderKind::all() {
            assert_eq!(ProviderKind::from_cli_name(kind.cli_name()), Some(*kind));
        }
        assert_eq!(ProviderKind::from_cli_name(" YouTube "), Some(ProviderKind::YouTube));
        assert_eq!(ProviderKind::from_cli_name("vimeo"), None);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ProviderKind::GitHub).unwrap();
        assert_eq!(json, "\"github\"");
    }
}
