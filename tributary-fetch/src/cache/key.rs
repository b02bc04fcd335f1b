//! Cache key construction and TTL tiers.

use std::fmt::Write as _;
use std::time::Duration;

use ring::digest;
use serde::{Deserialize, Serialize};

// ============================================================================
// TTL Tiers
// ============================================================================

/// Shared TTL tiers for call sites. The cache does not enforce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTtl {
    /// 5 minutes.
    Short,
    /// 1 hour.
    Medium,
    /// 24 hours.
    Long,
    /// 7 days.
    VeryLong,
}

impl CacheTtl {
    /// Tier length.
    pub fn duration(self) -> Duration {
        match self {
            Self::Short => Duration::from_secs(5 * 60),
            Self::Medium => Duration::from_secs(60 * 60),
            Self::Long => Duration::from_secs(24 * 60 * 60),
            Self::VeryLong => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Builds a logical key `namespace:operation:<sha256 of args>`.
///
/// `args` is canonicalised first (object keys sorted at every depth), so
/// two requests with the same arguments in a different order share a key.
pub fn keyed(namespace: &str, operation: &str, args: &serde_json::Value) -> String {
    let mut canonical = String::new();
    write_canonical(args, &mut canonical);
    let hash = digest::digest(&digest::SHA256, canonical.as_bytes());
    format!("{namespace}:{operation}:{}", hex(hash.as_ref()))
}

/// Writes `value` as compact JSON with object keys sorted.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_argument_order() {
        let a = json!({"cursor": "x", "page_size": 50, "opts": {"a": 1, "b": [1, 2]}});
        let b = json!({"opts": {"b": [1, 2], "a": 1}, "page_size": 50, "cursor": "x"});
        assert_eq!(keyed("youtube", "page", &a), keyed("youtube", "page", &b));
    }

    #[test]
    fn test_key_distinguishes_values() {
        let a = json!({"cursor": "x", "page_size": 50});
        let b = json!({"cursor": "x", "page_size": 51});
        assert_ne!(keyed("youtube", "page", &a), keyed("youtube", "page", &b));

        // Array order is significant.
        assert_ne!(
            keyed("n", "op", &json!([1, 2])),
            keyed("n", "op", &json!([2, 1]))
        );
    }

    #[test]
    fn test_key_shape() {
        let key = keyed("github", "page", &json!(null));
        assert!(key.starts_with("github:page:"));
        assert_eq!(key.len(), "github:page:".len() + 64);
    }

    #[test]
    fn test_canonical_json() {
        assert_eq!(
            canonical_json(&json!({"b": 1, "a": {"d": null, "c": "x"}})),
            r#"{"a":{"c":"x","d":null},"b":1}"#
        );
    }

    #[test]
    fn test_ttl_tiers() {
        assert_eq!(CacheTtl::Short.duration(), Duration::from_secs(300));
        assert_eq!(CacheTtl::VeryLong.duration(), Duration::from_secs(604_800));
    }
}
