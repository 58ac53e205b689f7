//! Spotify links are resolved to a YouTube search by page title.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::USER_AGENT;

use crate::error::DownloaderError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<title>(.*?)</title>").expect("valid title pattern"));

/// Links the downloader treats as Spotify pages.
pub fn is_spotify_page(url: &str) -> bool {
    url.contains("open.spotify.com")
}

/// Strip the Spotify decoration: `"Glimpse of Us - song by Joji | Spotify"` -> `"Glimpse of Us"`.
pub fn clean_spotify_title(raw: &str) -> String {
    let cut = [" - song by ", " | Spotify"].iter().filter_map(|sep| raw.find(sep)).min().unwrap_or(raw.len());
    raw[..cut].trim().to_string()
}

/// Pull `<title>` out of a page and clean it.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    Some(clean_spotify_title(raw)).filter(|t| !t.is_empty())
}

/// yt-dlp target that searches YouTube for the track title.
pub fn search_target(title: &str) -> String {
    format!("ytsearch1:{}", title)
}

/// Fetch the page and return its cleaned title.
pub async fn fetch_title(client: &Client, url: &str) -> Result<String, DownloaderError> {
    let resp = client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .await
        .map_err(|e| DownloaderError::network(url, format!("Spotify request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(DownloaderError::network(url, format!("Spotify returned non-success status: {}", resp.status())));
    }

    let html = resp.text().await.map_err(|e| DownloaderError::network(url, format!("Failed to read Spotify page: {e}")))?;

    extract_title(&html).ok_or_else(|| DownloaderError::process("Could not fetch title from Spotify URL"))
}
