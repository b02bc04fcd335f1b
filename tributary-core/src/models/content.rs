//! Raw and canonical content records.
//!
//! - [`RawRecord`] - A provider payload exactly as fetched
//! - [`ContentRecord`] - The unified representation written to the store
//! - [`ContentKey`] - The natural key `(provider, native id)`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::provider::ProviderKind;

// ============================================================================
// Raw Record
// ============================================================================

/// A record as returned by a provider, before canonical mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Provider the record came from.
    pub provider: ProviderKind,
    /// Untouched provider payload.
    pub payload: serde_json::Value,
    /// When the payload was fetched from the provider.
    pub fetched_at: DateTime<Utc>,
}

impl RawRecord {
    /// Wraps a provider payload.
    pub fn new(provider: ProviderKind, payload: serde_json::Value) -> Self {
        Self {
            provider,
            payload,
            fetched_at: Utc::now(),
        }
    }

    /// Reads a string field by JSON pointer (e.g. `/snippet/title`).
    ///
    /// Empty strings are treated as missing.
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.payload
            .pointer(pointer)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Reads a string-or-number field by JSON pointer as a string.
    pub fn id_at(&self, pointer: &str) -> Option<String> {
        match self.payload.pointer(pointer)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Reads an RFC 3339 timestamp by JSON pointer.
    pub fn time_at(&self, pointer: &str) -> Option<DateTime<Utc>> {
        self.str_at(pointer)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ============================================================================
// Content Kind
// ============================================================================

/// What sort of item a canonical record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A video.
    Video,
    /// A code repository.
    Repository,
    /// A row of tabular data.
    Record,
    /// An email campaign.
    Campaign,
    /// A generic document.
    Document,
}

impl ContentKind {
    /// Stable string form, used as the store column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Repository => "repository",
            Self::Record => "record",
            Self::Campaign => "campaign",
            Self::Document => "document",
        }
    }

    /// Parses the stable string form, falling back to `Document`.
    pub fn parse(s: &str) -> Self {
        match s {
            "video" => Self::Video,
            "repository" => Self::Repository,
            "record" => Self::Record,
            "campaign" => Self::Campaign,
            _ => Self::Document,
        }
    }
}

// ============================================================================
// Content Key
// ============================================================================

/// The natural key of a content record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentKey {
    /// Provider the item belongs to.
    pub provider: ProviderKind,
    /// The provider's own identifier for the item.
    pub native_id: String,
}

impl ContentKey {
    /// Creates a key.
    pub fn new(provider: ProviderKind, native_id: impl Into<String>) -> Self {
        Self {
            provider,
            native_id: native_id.into(),
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.native_id)
    }
}

// ============================================================================
// Content Record
// ============================================================================

/// Title used when a provider omits one.
pub const UNTITLED: &str = "Untitled";

/// The unified, provider-independent content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Provider the item came from.
    pub provider: ProviderKind,
    /// The provider's own identifier.
    pub native_id: String,
    /// What the item is.
    pub kind: ContentKind,
    /// Title (never empty; defaults to "Untitled").
    pub title: String,
    /// Longer description or body excerpt.
    #[serde(default)]
    pub description: Option<String>,
    /// Canonical URL of the item at the provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Author, owner or channel.
    #[serde(default)]
    pub author: Option<String>,
    /// Thumbnail or preview image.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the item was first published at the provider.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// When the provider last changed the item.
    #[serde(default)]
    pub source_updated_at: Option<DateTime<Utc>>,
    /// Provider-specific extras that have no canonical field.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// When this engine last wrote the item.
    pub synced_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Creates a record with only the required fields set.
    pub fn new(
        provider: ProviderKind,
        native_id: impl Into<String>,
        kind: ContentKind,
        title: Option<&str>,
    ) -> Self {
        Self {
            provider,
            native_id: native_id.into(),
            kind,
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(UNTITLED)
                .to_string(),
            description: None,
            url: None,
            author: None,
            thumbnail_url: None,
            tags: Vec::new(),
            published_at: None,
            source_updated_at: None,
            metadata: serde_json::Value::Null,
            synced_at: Utc::now(),
        }
    }

    /// Returns the natural key.
    pub fn key(&self) -> ContentKey {
        ContentKey::new(self.provider, self.native_id.clone())
    }

    /// Merges a newer sync of the same item into this one.
    ///
    /// Non-null values from `newer` win; fields `newer` leaves empty keep
    /// their stored value.
    pub fn merge_from(&mut self, newer: &ContentRecord) {
        self.kind = newer.kind;
        if newer.title != UNTITLED || self.title.is_empty() {
            self.title.clone_from(&newer.title);
        }
        merge_opt(&mut self.description, &newer.description);
        merge_opt(&mut self.url, &newer.url);
        merge_opt(&mut self.author, &newer.author);
        merge_opt(&mut self.thumbnail_url, &newer.thumbnail_url);
        if !newer.tags.is_empty() {
            self.tags.clone_from(&newer.tags);
        }
        if newer.published_at.is_some() {
            self.published_at = newer.published_at;
        }
        if newer.source_updated_at.is_some() {
            self.source_updated_at = newer.source_updated_at;
        }
        if !newer.metadata.is_null() {
            self.metadata = newer.metadata.clone();
        }
        self.synced_at = newer.synced_at;
    }
}

fn merge_opt(current: &mut Option<String>, newer: &Option<String>) {
    if newer.is_some() {
        current.clone_from(newer);
    }
}

// ============================================================================
// Upsert Outcome
// ============================================================================

/// Result of writing a record to the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    /// The key was new.
    Inserted,
    /// An existing row with the same key was updated.
    Updated,
}
