//! Parsing of `yt-dlp --flat-playlist -j` output.

use serde_json::Value;

use crate::backend::PlaylistEntry;
use crate::error::DownloaderError;

/// Thumbnail of a flat-playlist entry: `thumbnail`, else the last (largest)
/// `thumbnails[].url`.
fn resolve_thumbnail(v: &Value) -> Option<String> {
    let direct = v.get("thumbnail").and_then(|t| t.as_str()).filter(|s| !s.is_empty());

    direct
        .or_else(|| {
            v.get("thumbnails")
                .and_then(|arr| arr.as_array())
                .and_then(|thumbs| thumbs.last())
                .and_then(|t| t.get("url"))
                .and_then(|u| u.as_str())
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
}

fn parse_entry(v: &Value, with_thumbnails: bool) -> Option<PlaylistEntry> {
    let id = v.get("id").and_then(|i| i.as_str()).filter(|s| !s.is_empty())?;
    let title = v.get("title").and_then(|t| t.as_str()).filter(|s| !s.is_empty())?;

    Some(PlaylistEntry {
        id: id.to_string(),
        title: title.to_string(),
        thumbnail: if with_thumbnails { resolve_thumbnail(v) } else { None },
    })
}

/// Parse line-delimited JSON into entries, in output order.
///
/// Entries without both an id and a title are skipped. A line that is not
/// JSON fails the whole listing. Thumbnails are dropped unless
/// `with_thumbnails` is set.
pub fn parse_flat_playlist(stdout: &str, with_thumbnails: bool) -> Result<Vec<PlaylistEntry>, DownloaderError> {
    if stdout.trim().is_empty() {
        return Err(DownloaderError::empty_output("yt-dlp produced no video data (stdout was empty)"));
    }

    let mut entries = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let v: Value =
            serde_json::from_str(line).map_err(|e| DownloaderError::serialization("Failed to parse yt-dlp JSON line", e))?;
        if let Some(entry) = parse_entry(&v, with_thumbnails) {
            entries.push(entry);
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_flat_playlist_keeps_order() {
        let stdout = r#"{"id":"a1","title":"First","thumbnail":"https://i.ytimg.com/a1.jpg"}
{"id":"b2","title":"Second"}
{"id":"c3","title":"Third"}
"#;
        let entries = parse_flat_playlist(stdout, true).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a1", "b2", "c3"]);
        assert_eq!(entries[0].thumbnail.as_deref(), Some("https://i.ytimg.com/a1.jpg"));
        assert_eq!(entries[1].thumbnail, None);
    }

    #[test]
    fn test_entries_missing_id_or_title_are_skipped() {
        let stdout = r#"{"id":"a1"}
{"title":"No id"}
{"id":"","title":"Blank id"}
{"id":"ok","title":"Kept"}"#;
        let entries = parse_flat_playlist(stdout, true).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Kept");
    }

    #[test]
    fn test_thumbnail_falls_back_to_last_thumbnails_entry() {
        let stdout = r#"{"id":"a","title":"A","thumbnails":[{"url":"https://i/small.jpg"},{"url":"https://i/large.jpg"}]}"#;
        let entries = parse_flat_playlist(stdout, true).unwrap();
        assert_eq!(entries[0].thumbnail.as_deref(), Some("https://i/large.jpg"));
    }

    #[test]
    fn test_thumbnails_dropped_when_disabled() {
        let stdout = r#"{"id":"a","title":"A","thumbnail":"https://i/a.jpg"}
{"id":"b","title":"B","thumbnails":[{"url":"https://i/b.jpg"}]}"#;
        let entries = parse_flat_playlist(stdout, false).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.thumbnail.is_none()));
    }

    #[test]
    fn test_malformed_line_fails_the_listing() {
        let stdout = "{\"id\":\"a\",\"title\":\"A\"}\nnot json\n";
        let err = parse_flat_playlist(stdout, true).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EIntSerializeFailed);
    }

    #[test]
    fn test_empty_stdout_is_an_error() {
        let err = parse_flat_playlist("  \n", true).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EDlOutputUnavailable);
    }
}
