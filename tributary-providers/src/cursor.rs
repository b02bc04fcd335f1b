//! Cursor encoding shared by adapters.
//!
//! Each adapter defines its own cursor struct; the engine only ever sees
//! the JSON text produced here.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tributary_fetch::FetchError;

/// Decodes a checkpoint into an adapter cursor. `None` yields the default
/// (beginning of history).
pub fn decode<T: DeserializeOwned + Default>(checkpoint: Option<&str>) -> Result<T, FetchError> {
    match checkpoint.map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| FetchError::InvalidCursor(format!("{e}: {text}"))),
    }
}

/// Encodes an adapter cursor.
pub fn encode<T: Serialize>(cursor: &T) -> Result<String, FetchError> {
    Ok(serde_json::to_string(cursor)?)
}

/// Later of two optional timestamps.
pub fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// RFC 3339 with second precision and a `Z` suffix, as most APIs expect.
pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
