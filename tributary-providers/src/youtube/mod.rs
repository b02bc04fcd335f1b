//! YouTube provider implementation (reference adapter).
//!
//! Pages through a channel's uploads with the Data API `search.list`
//! endpoint, newest first. The cursor combines YouTube's native
//! `pageToken` with a `publishedAfter` watermark so incremental runs only
//! request videos published since the last completed run.
//!
//! Each `search.list` call costs 100 quota units; the default project
//! quota is 10,000 units per day.

mod adapter;
mod api;
mod descriptor;
mod error;
pub(crate) mod parser;

pub use adapter::{YouTubeAdapter, YouTubeCursor};
pub use api::{SearchListResponse, YouTubeApiClient};
pub use descriptor::youtube_descriptor;
pub use error::YouTubeError;
