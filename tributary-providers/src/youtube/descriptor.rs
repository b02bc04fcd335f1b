//! YouTube provider descriptor.

use std::sync::Arc;

use tributary_core::ProviderKind;
use tributary_fetch::{FetchError, ProviderAdapter};

use super::adapter::YouTubeAdapter;
use super::api::MAX_RESULTS;
use crate::descriptor::{ProviderDescriptor, ProviderMetadata, ProviderOptions};

/// Creates the YouTube provider descriptor.
pub fn youtube_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::YouTube)
        .metadata(ProviderMetadata {
            display_name: "YouTube",
            quota_unit: "quota units",
            default_daily_limit: 10_000,
            default_page_size: MAX_RESULTS,
            max_page_size: MAX_RESULTS,
            token_env_hint: "YOUTUBE_API_KEY",
            required_options: &["channel_id"],
            docs_url: "https://developers.google.com/youtube/v3/docs/search/list",
        })
        .aliases(&["yt"])
        .adapter(build)
        .build()
}

fn build(options: &ProviderOptions) -> Result<Arc<dyn ProviderAdapter>, FetchError> {
    Ok(Arc::new(YouTubeAdapter::from_options(options)?))
}
