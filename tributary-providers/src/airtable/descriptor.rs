//! Airtable provider descriptor.

use std::sync::Arc;

use tributary_core::ProviderKind;
use tributary_fetch::{FetchError, ProviderAdapter};

use super::adapter::AirtableAdapter;
use super::api::MAX_PAGE_SIZE;
use crate::descriptor::{ProviderDescriptor, ProviderMetadata, ProviderOptions};

/// Creates the Airtable provider descriptor.
pub fn airtable_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Airtable)
        .metadata(ProviderMetadata {
            display_name: "Airtable",
            quota_unit: "requests",
            default_daily_limit: 100_000,
            default_page_size: MAX_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            token_env_hint: "AIRTABLE_TOKEN",
            required_options: &["base_id", "table"],
            docs_url: "https://airtable.com/developers/web/api/list-records",
        })
        .aliases(&["at"])
        .adapter(build)
        .build()
}

fn build(options: &ProviderOptions) -> Result<Arc<dyn ProviderAdapter>, FetchError> {
    Ok(Arc::new(AirtableAdapter::from_options(options)?))
}
