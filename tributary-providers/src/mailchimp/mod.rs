//! Mailchimp provider implementation.
//!
//! Lists campaigns oldest first with offset paging, narrowed by a
//! `since_create_time` watermark once a listing has completed. The API
//! data center is taken from the key suffix (`...-us21`) unless the
//! `server` option says otherwise.

mod adapter;
mod api;
mod descriptor;
pub(crate) mod parser;

pub use adapter::{MailchimpAdapter, MailchimpCursor};
pub use api::{MailchimpApiClient, data_center};
pub use descriptor::mailchimp_descriptor;
