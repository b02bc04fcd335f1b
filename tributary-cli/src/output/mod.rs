//! Output formatting for CLI.

mod json;
mod text;

pub use json::{CacheOutput, JsonFormatter, QuotaOutput};
pub use text::TextFormatter;
#[cfg(test)]
mod tests;
