//! The invocation bridge consumed by the session.
//!
//! Every capability is a single async call. The session only ever sees this
//! trait, so the yt-dlp bridge in [`crate::downloader`] and the in-memory
//! fakes used in tests are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DownloaderError;

/// Output media kind handed to the downloader alongside the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// One video of an enumerated playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Persisted user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub download_path: String,
    #[serde(default = "default_true")]
    pub enable_thumbnails: bool,
}

fn default_true() -> bool {
    true
}

impl AppSettings {
    pub fn new(download_path: impl Into<String>) -> Self {
        Self {
            download_path: download_path.into(),
            enable_thumbnails: true,
        }
    }

    /// A usable configuration names a download directory.
    pub fn is_configured(&self) -> bool {
        !self.download_path.trim().is_empty()
    }
}

/// Arguments of a single `download_media` call.
///
/// `download_id` is minted by the caller; the backend stamps it on every
/// `DOWNLOAD_STATUS` event it emits for this download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub url: String,
    pub quality: String,
    pub format_type: MediaKind,
    pub download_id: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Resolve the display title of a single media URL.
    async fn get_media_title(&self, url: &str) -> Result<String, DownloaderError>;

    /// Enumerate the entries of a playlist URL in playlist order.
    async fn get_playlist_info(&self, url: &str) -> Result<Vec<PlaylistEntry>, DownloaderError>;

    /// Issue a download. Progress and the terminal outcome arrive as pushed events.
    async fn download_media(&self, request: DownloadRequest) -> Result<(), DownloaderError>;

    /// Ask the backend to stop a running download.
    async fn cancel_download(&self, download_id: &str) -> Result<(), DownloaderError>;

    async fn load_settings(&self) -> Result<AppSettings, DownloaderError>;

    async fn save_settings(&self, settings: AppSettings) -> Result<(), DownloaderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_thumbnails_on() {
        let settings: AppSettings = serde_json::from_str(r#"{"download_path":"/music"}"#).unwrap();
        assert!(settings.enable_thumbnails);
        assert!(settings.is_configured());
    }

    #[test]
    fn test_blank_download_path_is_unconfigured() {
        assert!(!AppSettings::new("   ").is_configured());
    }

    #[test]
    fn test_download_request_wire_names() {
        let request = DownloadRequest {
            url: "https://youtu.be/abc".into(),
            quality: "bestaudio".into(),
            format_type: MediaKind::Audio,
            download_id: "d1".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["formatType"], "audio");
        assert_eq!(json["downloadId"], "d1");
    }

    #[test]
    fn test_playlist_entry_thumbnail_optional() {
        let entry: PlaylistEntry = serde_json::from_str(r#"{"id":"abc","title":"First"}"#).unwrap();
        assert_eq!(entry.thumbnail, None);
    }
}
