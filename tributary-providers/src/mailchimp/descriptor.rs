//! Mailchimp provider descriptor.

use std::sync::Arc;

use tributary_core::ProviderKind;
use tributary_fetch::{FetchError, ProviderAdapter};

use super::adapter::MailchimpAdapter;
use crate::descriptor::{ProviderDescriptor, ProviderMetadata, ProviderOptions};

/// Creates the Mailchimp provider descriptor.
pub fn mailchimp_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Mailchimp)
        .metadata(ProviderMetadata {
            display_name: "Mailchimp",
            quota_unit: "requests",
            default_daily_limit: 50_000,
            default_page_size: 100,
            max_page_size: super::api::MAX_COUNT,
            token_env_hint: "MAILCHIMP_API_KEY",
            required_options: &[],
            docs_url: "https://mailchimp.com/developer/marketing/api/campaigns/list-campaigns/",
        })
        .aliases(&["mc"])
        .adapter(build)
        .build()
}

fn build(options: &ProviderOptions) -> Result<Arc<dyn ProviderAdapter>, FetchError> {
    Ok(Arc::new(MailchimpAdapter::from_options(options)?))
}
