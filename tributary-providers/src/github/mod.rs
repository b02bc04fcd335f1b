//! GitHub provider implementation.
//!
//! Lists an organization's or user's repositories sorted by last update.
//! The REST API pages by number, so the cursor simulates resumability with
//! a page number plus an `updated_at` watermark: a run stops at the first
//! repository not updated since the previous run.

mod adapter;
mod api;
mod descriptor;
pub(crate) mod parser;

pub use adapter::{GitHubAdapter, GitHubCursor, OwnerType};
pub use api::GitHubApiClient;
pub use descriptor::github_descriptor;
