//! Mailchimp campaign to canonical record mapping.

use serde_json::json;
use tributary_core::{ContentKind, ContentRecord, ProviderKind, RawRecord};

/// Maps a campaign to a canonical record.
pub fn to_canonical(raw: &RawRecord) -> Option<ContentRecord> {
    let id = raw.id_at("/id")?;
    let title = raw
        .str_at("/settings/title")
        .or_else(|| raw.str_at("/settings/subject_line"));

    let mut record = ContentRecord::new(ProviderKind::Mailchimp, id, ContentKind::Campaign, title);
    record.description = raw
        .str_at("/settings/preview_text")
        .or_else(|| raw.str_at("/settings/subject_line"))
        .map(str::to_string);
    record.url = raw
        .str_at("/archive_url")
        .or_else(|| raw.str_at("/long_archive_url"))
        .map(str::to_string);
    record.author = raw.str_at("/settings/from_name").map(str::to_string);
    record.published_at = raw
        .time_at("/send_time")
        .or_else(|| raw.time_at("/create_time"));
    record.source_updated_at = raw.time_at("/create_time");

    let p = &raw.payload;
    record.metadata = json!({
        "status": p.get("status"),
        "type": p.get("type"),
        "emails_sent": p.get("emails_sent"),
        "list_id": p.pointer("/recipients/list_id"),
    });

    Some(record)
}
