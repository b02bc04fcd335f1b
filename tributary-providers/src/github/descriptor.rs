//! GitHub provider descriptor.

use std::sync::Arc;

use tributary_core::ProviderKind;
use tributary_fetch::{FetchError, ProviderAdapter};

use super::adapter::GitHubAdapter;
use super::api::MAX_PER_PAGE;
use crate::descriptor::{ProviderDescriptor, ProviderMetadata, ProviderOptions};

/// Creates the GitHub provider descriptor.
pub fn github_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::GitHub)
        .metadata(ProviderMetadata {
            display_name: "GitHub",
            quota_unit: "requests",
            // Authenticated REST limit is 5,000 per hour.
            default_daily_limit: 120_000,
            default_page_size: MAX_PER_PAGE,
            max_page_size: MAX_PER_PAGE,
            token_env_hint: "GITHUB_TOKEN",
            required_options: &["owner"],
            docs_url: "https://docs.github.com/rest/repos/repos",
        })
        .aliases(&["gh"])
        .adapter(build)
        .build()
}

fn build(options: &ProviderOptions) -> Result<Arc<dyn ProviderAdapter>, FetchError> {
    Ok(Arc::new(GitHubAdapter::from_options(options)?))
}
