// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Tributary Providers
//!
//! Provider adapters for the Tributary sync engine.
//!
//! Each provider module includes:
//!
//! - **Descriptor**: Static configuration (metadata, quota defaults, CLI names)
//! - **Adapter**: Page fetching with a resumable cursor
//! - **Parser**: Raw payload to canonical record mapping
//!
//! ## Supported Providers
//!
//! | Provider | Cursor | Auth | Unit cost |
//! |----------|--------|------|-----------|
//! | YouTube | page token + publish watermark | API key (query) | 100 / page |
//! | GitHub | page number + update watermark | Bearer token | 1 / page |
//! | Airtable | offset + modification watermark | Bearer token | 1 / page |
//! | Mailchimp | offset + creation watermark | Basic (API key) | 1 / page |
//!
//! ## Usage
//!
//! ```ignore
//! use tributary_providers::{ProviderOptions, ProviderRegistry};
//! use tributary_core::ProviderKind;
//!
//! let options = ProviderOptions::default().with("channel_id", "UC...");
//! let adapter = ProviderRegistry::build_adapter(ProviderKind::YouTube, &options)?;
//! let page = adapter.fetch_page(&ctx, &credential, None, 50).await?;
//! ```

pub mod cursor;
pub mod descriptor;
pub mod registry;

// Provider modules (alphabetical)
pub mod airtable;
pub mod github;
pub mod mailchimp;
pub mod youtube;

// Re-export key types
pub use descriptor::{
    BuildAdapterFn, CliConfig, ProviderDescriptor, ProviderDescriptorBuilder, ProviderMetadata,
    ProviderOptions,
};
pub use registry::ProviderRegistry;

// Re-export provider descriptors
pub use airtable::airtable_descriptor;
pub use github::github_descriptor;
pub use mailchimp::mailchimp_descriptor;
pub use youtube::youtube_descriptor;

// Re-export adapters for convenience
pub use airtable::{AirtableAdapter, AirtableCursor};
pub use github::{GitHubAdapter, GitHubCursor, OwnerType};
pub use mailchimp::{MailchimpAdapter, MailchimpCursor};
pub use youtube::{YouTubeAdapter, YouTubeCursor, YouTubeError};
