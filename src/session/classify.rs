//! URL facet classification.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static YOUTUBE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+$").expect("valid youtube pattern"));

static SPOTIFY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?://)?(open\.)?spotify\.com/.+$").expect("valid spotify pattern"));

/// Marker of a playlist query parameter. Not validated as a real parameter.
const PLAYLIST_MARKER: &str = "list=";

pub fn is_youtube(url: &str) -> bool {
    YOUTUBE_RE.is_match(url)
}

pub fn is_spotify(url: &str) -> bool {
    SPOTIFY_RE.is_match(url)
}

/// A playlist is a YouTube URL carrying `list=` anywhere in it.
pub fn is_playlist(url: &str) -> bool {
    url.contains(PLAYLIST_MARKER) && is_youtube(url)
}

/// The three facets of one URL value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UrlFacets {
    pub is_youtube: bool,
    pub is_spotify: bool,
    pub is_playlist: bool,
}

impl UrlFacets {
    pub fn of(url: &str) -> Self {
        let is_youtube = is_youtube(url);
        Self {
            is_youtube,
            is_spotify: is_spotify(url),
            is_playlist: is_youtube && url.contains(PLAYLIST_MARKER),
        }
    }
}
