//! Airtable provider implementation.
//!
//! Reads one table (optionally through a view) with the native `offset`
//! cursor. Incremental runs filter on `LAST_MODIFIED_TIME()` against the
//! start time of the previous completed listing.

mod adapter;
mod api;
mod descriptor;
pub(crate) mod parser;

pub use adapter::{AirtableAdapter, AirtableCursor};
pub use api::AirtableApiClient;
pub use descriptor::airtable_descriptor;
