//! GitHub repository to canonical record mapping.

use serde_json::json;
use tributary_core::{ContentKind, ContentRecord, ProviderKind, RawRecord};

/// Maps a repository object to a canonical record.
pub fn to_canonical(raw: &RawRecord) -> Option<ContentRecord> {
    let id = raw.id_at("/id")?;
    let title = raw.str_at("/full_name").or_else(|| raw.str_at("/name"));

    let mut record = ContentRecord::new(ProviderKind::GitHub, id, ContentKind::Repository, title);
    record.description = raw.str_at("/description").map(str::to_string);
    record.url = raw.str_at("/html_url").map(str::to_string);
    record.author = raw.str_at("/owner/login").map(str::to_string);
    record.thumbnail_url = raw.str_at("/owner/avatar_url").map(str::to_string);
    record.tags = raw
        .payload
        .get("topics")
        .and_then(serde_json::Value::as_array)
        .map(|topics| {
            topics
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    record.published_at = raw.time_at("/created_at");
    record.source_updated_at = raw.time_at("/updated_at");

    let p = &raw.payload;
    record.metadata = json!({
        "stars": p.get("stargazers_count"),
        "forks": p.get("forks_count"),
        "language": p.get("language"),
        "archived": p.get("archived"),
        "default_branch": p.get("default_branch"),
    });

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository() {
        let raw = RawRecord::new(
            ProviderKind::GitHub,
            json!({
                "id": 724712,
                "name": "rust",
                "full_name": "rust-lang/rust",
                "description": "Empowering everyone",
                "html_url": "https://github.com/rust-lang/rust",
                "owner": {"login": "rust-lang", "avatar_url": "https://avatars/x.png"},
                "topics": ["compiler", "language"],
                "created_at": "2010-06-16T20:39:03Z",
                "updated_at": "2024-05-01T00:00:00Z",
                "stargazers_count": 90000,
                "language": "Rust",
                "archived": false
            }),
        );

        let record = to_canonical(&raw).unwrap();
        assert_eq!(record.native_id, "724712");
        assert_eq!(record.title, "rust-lang/rust");
        assert_eq!(record.author.as_deref(), Some("rust-lang"));
        assert_eq!(record.tags, vec!["compiler", "language"]);
        assert!(record.source_updated_at.is_some());
        assert_eq!(record.metadata["stars"], 90000);
        assert_eq!(record.kind, ContentKind::Repository);
    }

    #[test]
    fn test_missing_id() {
        let raw = RawRecord::new(ProviderKind::GitHub, json!({"name": "orphan"}));
        assert!(to_canonical(&raw).is_none());
    }

    #[test]
    fn test_name_fallback() {
        let raw = RawRecord::new(ProviderKind::GitHub, json!({"id": 1, "name": "only-name"}));
        let record = to_canonical(&raw).unwrap();
        assert_eq!(record.title, "only-name");
        assert!(record.tags.is_empty());
    }
}
