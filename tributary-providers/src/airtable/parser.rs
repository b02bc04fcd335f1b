//! Airtable record to canonical record mapping.
//!
//! Airtable tables have no fixed schema. Well-known field names are picked
//! for the canonical fields; the full `fields` object is kept in metadata.

use serde_json::json;
use tributary_core::{ContentKind, ContentRecord, ProviderKind, RawRecord};

const TITLE_FIELDS: [&str; 3] = ["Name", "Title", "name"];
const DESCRIPTION_FIELDS: [&str; 3] = ["Description", "Notes", "description"];
const URL_FIELDS: [&str; 3] = ["URL", "Link", "url"];
const AUTHOR_FIELDS: [&str; 2] = ["Author", "Owner"];
const TAG_FIELDS: [&str; 2] = ["Tags", "tags"];

/// Maps a record using the default title fields.
pub fn to_canonical(raw: &RawRecord) -> Option<ContentRecord> {
    to_canonical_with(raw, None)
}

/// Maps a record, preferring `title_field` for the title when given.
pub fn to_canonical_with(raw: &RawRecord, title_field: Option<&str>) -> Option<ContentRecord> {
    let id = raw.id_at("/id")?;

    let title = title_field
        .and_then(|f| field_str(raw, f))
        .or_else(|| first_field(raw, &TITLE_FIELDS));

    let mut record = ContentRecord::new(ProviderKind::Airtable, id, ContentKind::Record, title);
    record.description = first_field(raw, &DESCRIPTION_FIELDS).map(str::to_string);
    record.url = first_field(raw, &URL_FIELDS).map(str::to_string);
    record.author = first_field(raw, &AUTHOR_FIELDS).map(str::to_string);
    record.tags = TAG_FIELDS
        .iter()
        .find_map(|f| raw.payload.pointer(&format!("/fields/{f}"))?.as_array())
        .map(|tags| {
            tags.iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    record.published_at = raw.time_at("/createdTime");
    record.metadata = json!({ "fields": raw.payload.get("fields") });

    Some(record)
}

fn field_str<'a>(raw: &'a RawRecord, field: &str) -> Option<&'a str> {
    // JSON pointer escaping for field names containing '/' or '~'.
    let escaped = field.replace('~', "~0").replace('/', "~1");
    raw.str_at(&format!("/fields/{escaped}"))
}

fn first_field<'a>(raw: &'a RawRecord, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|f| field_str(raw, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(payload: serde_json::Value) -> RawRecord {
        RawRecord::new(ProviderKind::Airtable, payload)
    }

    #[test]
    fn test_well_known_fields() {
        let record = to_canonical(&raw(json!({
            "id": "rec123",
            "createdTime": "2024-01-01T10:00:00.000Z",
            "fields": {
                "Name": "Launch plan",
                "Notes": "Draft",
                "Link": "https://example.com",
                "Tags": ["q1", "launch"],
                "Priority": 2
            }
        })))
        .unwrap();

        assert_eq!(record.native_id, "rec123");
        assert_eq!(record.title, "Launch plan");
        assert_eq!(record.description.as_deref(), Some("Draft"));
        assert_eq!(record.url.as_deref(), Some("https://example.com"));
        assert_eq!(record.tags, vec!["q1", "launch"]);
        assert!(record.published_at.is_some());
        assert_eq!(record.metadata["fields"]["Priority"], 2);
    }

    #[test]
    fn test_custom_title_field() {
        let record = to_canonical_with(
            &raw(json!({"id": "rec1", "fields": {"Headline": "Hi", "Name": "ignored"}})),
            Some("Headline"),
        )
        .unwrap();
        assert_eq!(record.title, "Hi");
    }

    #[test]
    fn test_empty_fields() {
        let record = to_canonical(&raw(json!({"id": "rec1", "fields": {}}))).unwrap();
        assert_eq!(record.title, tributary_core::UNTITLED);
        assert!(to_canonical(&raw(json!({"fields": {}}))).is_none());
    }
}
