//! YouTube search result to canonical record mapping.

use serde_json::json;
use tributary_core::{ContentKind, ContentRecord, ProviderKind, RawRecord};

/// Watch page URL prefix.
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Thumbnail sizes, best first.
const THUMBNAIL_SIZES: [&str; 3] = ["high", "medium", "default"];

/// Extracts the video id from a search result (`id.videoId`) or a video
/// resource (`id` as a string).
pub fn video_id(raw: &RawRecord) -> Option<String> {
    raw.id_at("/id/videoId").or_else(|| raw.id_at("/id"))
}

/// Maps a search result to a canonical record.
///
/// Returns `None` when the result carries no video id.
pub fn to_canonical(raw: &RawRecord) -> Option<ContentRecord> {
    let id = video_id(raw)?;

    let title = raw.str_at("/snippet/title").map(unescape_html);
    let mut record = ContentRecord::new(
        ProviderKind::YouTube,
        id.as_str(),
        ContentKind::Video,
        title.as_deref(),
    );

    record.description = raw.str_at("/snippet/description").map(unescape_html);
    record.author = raw.str_at("/snippet/channelTitle").map(unescape_html);
    record.thumbnail_url = THUMBNAIL_SIZES
        .iter()
        .find_map(|size| raw.str_at(&format!("/snippet/thumbnails/{size}/url")))
        .map(str::to_string);
    record.url = Some(format!("{WATCH_URL}{id}"));
    record.published_at = raw.time_at("/snippet/publishedAt");
    record.metadata = json!({
        "channel_id": raw.str_at("/snippet/channelId"),
        "live_broadcast": raw.str_at("/snippet/liveBroadcastContent"),
    });

    Some(record)
}

/// Search snippets come back HTML-escaped.
pub(crate) fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(payload: serde_json::Value) -> RawRecord {
        RawRecord::new(ProviderKind::YouTube, payload)
    }

    #[test]
    fn test_full_search_result() {
        let record = to_canonical(&raw(json!({
            "kind": "youtube#searchResult",
            "id": {"kind": "youtube#video", "videoId": "dQw4w9WgXcQ"},
            "snippet": {
                "publishedAt": "2024-05-01T12:30:00Z",
                "channelId": "UC123",
                "title": "Rock &amp; Roll &quot;Live&quot;",
                "description": "It&#39;s here",
                "channelTitle": "Channel",
                "liveBroadcastContent": "none",
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/d.jpg"},
                    "high": {"url": "https://i.ytimg.com/h.jpg"}
                }
            }
        })))
        .unwrap();

        assert_eq!(record.native_id, "dQw4w9WgXcQ");
        assert_eq!(record.kind, ContentKind::Video);
        assert_eq!(record.title, "Rock & Roll \"Live\"");
        assert_eq!(record.description.as_deref(), Some("It's here"));
        assert_eq!(record.author.as_deref(), Some("Channel"));
        assert_eq!(
            record.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/h.jpg")
        );
        assert_eq!(
            record.url.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(
            record.published_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap())
        );
        assert_eq!(record.metadata["channel_id"], "UC123");
    }

    #[test]
    fn test_missing_title_is_untitled() {
        let record = to_canonical(&raw(json!({"id": {"videoId": "v1"}, "snippet": {}}))).unwrap();
        assert_eq!(record.title, tributary_core::UNTITLED);
        assert!(record.published_at.is_none());
    }

    #[test]
    fn test_missing_id_is_skipped() {
        assert!(to_canonical(&raw(json!({"id": {"kind": "youtube#channel"}}))).is_none());
        assert!(to_canonical(&raw(json!({"snippet": {"title": "x"}}))).is_none());
    }

    #[test]
    fn test_video_resource_id() {
        let record = to_canonical(&raw(json!({"id": "abc", "snippet": {"title": "t"}}))).unwrap();
        assert_eq!(record.native_id, "abc");
    }

    #[test]
    fn test_unescape_amp_last() {
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
        assert_eq!(unescape_html("plain"), "plain");
    }
}
