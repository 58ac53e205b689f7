//! Output format catalog and the single-choice selection over it.

use crate::backend::MediaKind;
use crate::error::DownloaderError;

use super::classify::UrlFacets;

/// Selector used for single URLs that are neither YouTube nor Spotify.
pub const GENERIC_SELECTOR: &str = "best[ext=mp4]/best";

pub const DEFAULT_FORMAT_ID: &str = "720p";

/// Forced selection whenever the URL turns into a Spotify link.
pub const SPOTIFY_FORMAT_ID: &str = "mp3_320";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOption {
    pub id: &'static str,
    pub label: &'static str,
    pub quality: &'static str,
    pub kind: MediaKind,
    /// yt-dlp `-f` expression.
    pub selector: &'static str,
}

pub static FORMAT_OPTIONS: [FormatOption; 5] = [
    FormatOption {
        id: "1080p",
        label: "1080p MP4",
        quality: "High quality video",
        kind: MediaKind::Video,
        selector: "bestvideo[height<=1080][vcodec^=avc]+bestaudio[acodec^=mp4a]/best[height<=1080][vcodec^=avc]",
    },
    FormatOption {
        id: "720p",
        label: "720p MP4",
        quality: "Standard quality video",
        kind: MediaKind::Video,
        selector: "bestvideo[height<=720][vcodec^=avc]+bestaudio[acodec^=mp4a]/best[height<=720][vcodec^=avc]",
    },
    FormatOption {
        id: "480p",
        label: "480p MP4",
        quality: "Low quality video",
        kind: MediaKind::Video,
        selector: "bestvideo[height<=480][vcodec^=avc]+bestaudio[acodec^=mp4a]/best[height<=480][vcodec^=avc]",
    },
    FormatOption {
        id: "mp3_320",
        label: "MP3 320kbps",
        quality: "High quality audio",
        kind: MediaKind::Audio,
        selector: "bestaudio[acodec=mp3]/bestaudio",
    },
    FormatOption {
        id: "mp3_128",
        label: "MP3 128kbps",
        quality: "Standard quality audio",
        kind: MediaKind::Audio,
        selector: "bestaudio[acodec=mp3][abr<=128]/bestaudio",
    },
];

pub fn find_format(id: &str) -> Option<&'static FormatOption> {
    FORMAT_OPTIONS.iter().find(|f| f.id == id)
}

fn format_index(id: &str) -> Option<usize> {
    FORMAT_OPTIONS.iter().position(|f| f.id == id)
}

/// Pointer into [`FORMAT_OPTIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSelection {
    index: usize,
}

impl Default for FormatSelection {
    fn default() -> Self {
        Self {
            index: format_index(DEFAULT_FORMAT_ID).unwrap_or(0),
        }
    }
}

impl FormatSelection {
    pub fn current(&self) -> &'static FormatOption {
        &FORMAT_OPTIONS[self.index]
    }

    pub fn select(&mut self, id: &str) -> Result<&'static FormatOption, DownloaderError> {
        let index = format_index(id).ok_or_else(|| DownloaderError::invalid_format(format!("Unknown format: {}", id)))?;
        self.index = index;
        Ok(self.current())
    }

    /// React to a URL edit. Returns true when the selection was forced.
    ///
    /// Only the false -> true edge of `is_spotify` forces the audio entry, so a
    /// video format picked while the Spotify URL is still present sticks.
    pub fn observe_facets(&mut self, previous: UrlFacets, next: UrlFacets) -> bool {
        if next.is_spotify
            && !previous.is_spotify
            && let Some(index) = format_index(SPOTIFY_FORMAT_ID)
        {
            self.index = index;
            return true;
        }
        false
    }

    /// Selector for a single-URL download of a URL with these facets.
    pub fn selector_for(&self, facets: UrlFacets) -> &'static str {
        if facets.is_youtube || facets.is_spotify {
            self.current().selector
        } else {
            GENERIC_SELECTOR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        let videos = FORMAT_OPTIONS.iter().filter(|f| f.kind == MediaKind::Video).count();
        let audios = FORMAT_OPTIONS.iter().filter(|f| f.kind == MediaKind::Audio).count();
        assert_eq!((videos, audios), (3, 2));
        assert_eq!(find_format("mp3_128").map(|f| f.label), Some("MP3 128kbps"));
        assert!(find_format("4k").is_none());
    }

    #[test]
    fn test_default_is_mid_quality_video() {
        let selection = FormatSelection::default();
        assert_eq!(selection.current().id, "720p");
        assert_eq!(selection.current().kind, MediaKind::Video);
    }

    #[test]
    fn test_select_rejects_unknown_ids() {
        let mut selection = FormatSelection::default();
        assert!(selection.select("flac").is_err());
        assert_eq!(selection.current().id, "720p");
        assert_eq!(selection.select("480p").unwrap().id, "480p");
    }

    #[test]
    fn test_spotify_edge_forces_audio_once() {
        let mut selection = FormatSelection::default();
        selection.select("1080p").unwrap();

        let youtube = UrlFacets::of("https://youtu.be/abc");
        let spotify = UrlFacets::of("https://open.spotify.com/track/1");

        assert!(selection.observe_facets(youtube, spotify));
        assert_eq!(selection.current().id, SPOTIFY_FORMAT_ID);

        // A later video pick while still on Spotify is not overridden.
        selection.select("480p").unwrap();
        let other_spotify = UrlFacets::of("https://open.spotify.com/track/2");
        assert!(!selection.observe_facets(spotify, other_spotify));
        assert_eq!(selection.current().id, "480p");

        // Leaving and re-entering Spotify fires again.
        assert!(!selection.observe_facets(spotify, youtube));
        assert!(selection.observe_facets(youtube, spotify));
        assert_eq!(selection.current().id, SPOTIFY_FORMAT_ID);
    }

    #[test]
    fn test_selector_falls_back_for_unknown_hosts() {
        let selection = FormatSelection::default();
        assert_eq!(selection.selector_for(UrlFacets::of("https://vimeo.com/1")), GENERIC_SELECTOR);
        assert_eq!(selection.selector_for(UrlFacets::of("https://youtu.be/abc")), selection.current().selector);
    }
}
