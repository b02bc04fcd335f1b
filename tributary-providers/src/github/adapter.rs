//! GitHub adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use tributary_core::{ContentRecord, LeasedCredential, ProviderKind, RawRecord};
use tributary_fetch::{FetchContext, FetchError, Page, ProviderAdapter};

use super::api::GitHubApiClient;
use super::parser;
use crate::cursor::{self, latest};
use crate::descriptor::ProviderOptions;

// ============================================================================
// Owner Type
// ============================================================================

/// Whether the owner is an organization or a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerType {
    /// `/orgs/{owner}/repos`.
    #[default]
    Org,
    /// `/users/{owner}/repos`.
    User,
}

impl OwnerType {
    /// Path segment for the listing endpoint.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Org => "orgs",
            Self::User => "users",
        }
    }

    fn parse(s: &str) -> Result<Self, FetchError> {
        match s.to_lowercase().as_str() {
            "org" | "orgs" | "organization" => Ok(Self::Org),
            "user" | "users" => Ok(Self::User),
            other => Err(FetchError::NotConfigured(format!(
                "github: owner_type must be `org` or `user`, got `{other}`"
            ))),
        }
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Simulated cursor over a page-numbered listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubCursor {
    /// Next page number; 0 means "start a new listing".
    #[serde(default)]
    pub page: u32,
    /// Repositories updated at or before this instant were already synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// Newest `updated_at` seen in the listing in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_seen: Option<DateTime<Utc>>,
}

impl GitHubCursor {
    /// Page number to request.
    pub fn request_page(&self) -> u32 {
        self.page.max(1)
    }

    /// Keeps repositories updated after the watermark and computes the
    /// next cursor. The listing is sorted newest first, so everything after
    /// the first stale repository is stale too.
    pub fn advance(
        &self,
        items: Vec<serde_json::Value>,
        per_page: u32,
    ) -> (Vec<serde_json::Value>, Self, bool) {
        let full_page = items.len() >= per_page as usize;
        let mut fresh = Vec::with_capacity(items.len());
        let mut reached_watermark = false;
        let mut page_newest = None;

        for item in items {
            let updated = updated_at(&item);
            if let (Some(since), Some(ts)) = (self.since, updated) {
                if ts <= since {
                    reached_watermark = true;
                    break;
                }
            }
            page_newest = latest(page_newest, updated);
            fresh.push(item);
        }

        let newest_seen = latest(self.newest_seen, page_newest);
        if full_page && !reached_watermark {
            let next = Self {
                page: self.request_page() + 1,
                since: self.since,
                newest_seen,
            };
            (fresh, next, true)
        } else {
            let next = Self {
                page: 0,
                since: latest(self.since, newest_seen),
                newest_seen: None,
            };
            (fresh, next, false)
        }
    }
}

fn updated_at(item: &serde_json::Value) -> Option<DateTime<Utc>> {
    item.get("updated_at")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter listing an owner's repositories.
#[derive(Debug, Clone)]
pub struct GitHubAdapter {
    owner: String,
    owner_type: OwnerType,
    api: GitHubApiClient,
}

impl GitHubAdapter {
    /// Creates an adapter for an organization.
    pub fn new(owner: impl Into<String>, owner_type: OwnerType) -> Self {
        Self {
            owner: owner.into(),
            owner_type,
            api: GitHubApiClient::new(),
        }
    }

    /// Creates an adapter from options (`owner`, optional `owner_type` and
    /// `base_url`).
    pub fn from_options(options: &ProviderOptions) -> Result<Self, FetchError> {
        let owner = options.require(ProviderKind::GitHub, "owner")?;
        let owner_type = OwnerType::parse(options.get_or("owner_type", "org"))?;
        let api = match options.get("base_url") {
            Some(base) => GitHubApiClient::with_base_url(base),
            None => GitHubApiClient::new(),
        };
        Ok(Self {
            owner: owner.to_string(),
            owner_type,
            api,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GitHubAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    #[instrument(skip(self, ctx, credential), fields(owner = %self.owner))]
    async fn fetch_page(
        &self,
        ctx: &FetchContext,
        credential: &LeasedCredential,
        checkpoint: Option<&str>,
        page_size: u32,
    ) -> Result<Page, FetchError> {
        let cursor: GitHubCursor = cursor::decode(checkpoint)?;

        let items = self
            .api
            .list_repos(
                &ctx.http,
                &credential.token,
                self.owner_type.path(),
                &self.owner,
                cursor.request_page(),
                page_size,
            )
            .await?;

        let (fresh, next, has_more) = cursor.advance(items, page_size);
        debug!(fresh = fresh.len(), has_more, "GitHub page fetched");

        let records = fresh
            .into_iter()
            .map(|item| RawRecord::new(ProviderKind::GitHub, item))
            .collect();

        Ok(Page::new(
            records,
            Some(cursor::encode(&next)?),
            has_more,
            self.units_per_page(),
        ))
    }

    fn to_canonical(&self, raw: &RawRecord) -> Option<ContentRecord> {
        parser::to_canonical(raw)
    }

    fn cache_scope(&self) -> serde_json::Value {
        json!({ "owner": self.owner, "owner_type": self.owner_type.path() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repo(id: u32, day: u32) -> serde_json::Value {
        json!({"id": id, "updated_at": format!("2024-02-{day:02}T00:00:00Z")})
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_full_page_continues() {
        let cursor = GitHubCursor::default();
        let (fresh, next, has_more) = cursor.advance(vec![repo(1, 9), repo(2, 8)], 2);

        assert_eq!(fresh.len(), 2);
        assert!(has_more);
        assert_eq!(next.page, 2);
        assert_eq!(next.newest_seen, Some(ts(9)));
        assert_eq!(next.since, None);
    }

    #[test]
    fn test_stops_at_watermark() {
        let cursor = GitHubCursor {
            page: 0,
            since: Some(ts(5)),
            newest_seen: None,
        };
        let (fresh, next, has_more) =
            cursor.advance(vec![repo(1, 9), repo(2, 5), repo(3, 4)], 3);

        assert_eq!(fresh.len(), 1);
        assert!(!has_more);
        assert_eq!(next.page, 0);
        assert_eq!(next.since, Some(ts(9)));
    }

    #[test]
    fn test_short_page_finishes_listing() {
        let cursor = GitHubCursor {
            page: 3,
            since: None,
            newest_seen: Some(ts(20)),
        };
        let (_, next, has_more) = cursor.advance(vec![repo(1, 2)], 100);
        assert!(!has_more);
        assert_eq!(next.since, Some(ts(20)));
    }

    #[test]
    fn test_owner_type_option() {
        let options = ProviderOptions::default()
            .with("owner", "octocat")
            .with("owner_type", "user");
        let adapter = GitHubAdapter::from_options(&options).unwrap();
        assert_eq!(adapter.owner_type, OwnerType::User);

        let bad = ProviderOptions::default()
            .with("owner", "x")
            .with("owner_type", "team");
        assert!(GitHubAdapter::from_options(&bad).is_err());
    }
}
