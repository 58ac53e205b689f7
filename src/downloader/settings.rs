//! Persisted settings, yt-dlp configuration and boundary validation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::backend::{AppSettings, MediaKind};
use crate::error::DownloaderError;

/// Maximum URL length to prevent abuse
pub const MAX_URL_LENGTH: usize = 4096;

/// Maximum download path length (OS limits)
pub const MAX_DOWNLOAD_PATH_LENGTH: usize = 1024;

pub const SETTINGS_FILE: &str = "settings.json";

pub const CONFIG_DIR_ENV: &str = "YEYO_CONFIG_DIR";
pub const YT_DLP_ENV: &str = "YEYO_YT_DLP";

/// Characters rejected in URLs even though arguments never reach a shell.
/// `&` is allowed since playlist URLs carry `&list=`.
const DANGEROUS_SHELL_CHARS: &[char] = &['|', ';', '$', '`', '\n', '\r', '(', ')', '<', '>'];

/// Validate a URL before it is handed to yt-dlp.
///
/// Scheme-less URLs (`youtu.be/abc`) pass; an explicit scheme must be http or https.
pub fn validate_url(url: &str) -> Result<(), DownloaderError> {
    if url.trim().is_empty() {
        return Err(DownloaderError::invalid_url("URL cannot be empty"));
    }

    if let Some((scheme, _)) = url.split_once("://")
        && !matches!(scheme, "http" | "https")
    {
        return Err(DownloaderError::invalid_url("URL must start with http:// or https://"));
    }

    // yt-dlp would read it as an option
    if url.starts_with('-') {
        return Err(DownloaderError::invalid_url("URL cannot start with '-'"));
    }

    if url.len() > MAX_URL_LENGTH {
        return Err(DownloaderError::invalid_url(format!("URL is too long (max {} characters)", MAX_URL_LENGTH)));
    }

    if url.chars().any(|c| DANGEROUS_SHELL_CHARS.contains(&c)) {
        return Err(DownloaderError::invalid_url("URL contains invalid characters"));
    }

    Ok(())
}

/// Validate the configured download directory
pub fn validate_download_path(location: &str) -> Result<(), DownloaderError> {
    if location.trim().is_empty() {
        return Err(DownloaderError::invalid_path("Download location cannot be empty"));
    }

    if location.len() > MAX_DOWNLOAD_PATH_LENGTH {
        return Err(DownloaderError::invalid_path(format!(
            "Download location path is too long (max {} characters)",
            MAX_DOWNLOAD_PATH_LENGTH
        )));
    }

    Ok(())
}

/// Output directory for a media kind under the download path.
pub fn output_dir(download_path: &str, kind: MediaKind) -> PathBuf {
    let sub_dir = match kind {
        MediaKind::Audio => "Audio",
        MediaKind::Video => "Video",
    };
    Path::new(download_path).join(sub_dir)
}

/// Build format arguments for yt-dlp from the quality selector and media kind
pub fn build_format_args(quality: &str, kind: MediaKind) -> Vec<String> {
    let mut args = vec!["-f".to_string(), quality.to_string()];

    match kind {
        MediaKind::Audio => {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push("mp3".to_string());
        }
        MediaKind::Video => {
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }
    }

    args
}

/// Where the yt-dlp binary lives.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub binary: PathBuf,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
        }
    }
}

impl YtDlpConfig {
    /// Honour `YEYO_YT_DLP` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(YT_DLP_ENV) {
            Some(path) if !path.is_empty() => Self { binary: path.into() },
            _ => Self::default(),
        }
    }
}

/// `settings.json` inside a config directory.
///
/// A missing file is replaced by defaults pointing at the OS download
/// directory, which are written back so the next load finds them.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    config_dir: PathBuf,
    default_download_dir: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            default_download_dir: dirs_next::download_dir(),
        }
    }

    /// Override where first-run defaults point. `None` leaves a missing
    /// settings file unconfigured.
    pub fn with_default_download_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.default_download_dir = dir;
        self
    }

    /// Store rooted at `YEYO_CONFIG_DIR`.
    pub fn from_env() -> Result<Self, DownloaderError> {
        match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Ok(Self::new(dir)),
            _ => Err(DownloaderError::not_configured(format!("{} is not set", CONFIG_DIR_ENV))),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    pub async fn load(&self) -> Result<AppSettings, DownloaderError> {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return self.create_default().await,
            Err(e) => return Err(DownloaderError::io("Failed to read settings file", e)),
        };

        serde_json::from_str(&content).map_err(|e| DownloaderError::serialization("Failed to parse settings file", e))
    }

    async fn create_default(&self) -> Result<AppSettings, DownloaderError> {
        let dir = self
            .default_download_dir
            .as_deref()
            .ok_or_else(|| DownloaderError::not_configured("Could not determine the default download directory"))?;
        let download_path = dir
            .to_str()
            .ok_or_else(|| DownloaderError::not_configured("Default download path contains invalid characters"))?;

        let settings = AppSettings::new(download_path);
        self.save(&settings).await?;
        Ok(settings)
    }

    pub async fn save(&self, settings: &AppSettings) -> Result<(), DownloaderError> {
        validate_download_path(&settings.download_path)?;

        tokio::fs::create_dir_all(&self.config_dir)
            .await
            .map_err(|e| DownloaderError::io("Failed to create settings directory", e))?;

        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| DownloaderError::serialization("Failed to serialize settings", e))?;

        tokio::fs::write(self.path(), json).await.map_err(|e| DownloaderError::io("Failed to write settings file", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("yeyo-{}-{}", label, uuid::Uuid::new_v4()))
    }

    fn scratch_store() -> SettingsStore {
        SettingsStore::new(scratch_dir("settings")).with_default_download_dir(None)
    }

    // ========================================
    // URL Validation Tests
    // ========================================

    #[test]
    fn test_validate_url_accepts_media_urls() {
        assert!(validate_url("https://www.youtube.com/watch?v=abc&list=PL1").is_ok());
        assert!(validate_url("http://youtu.be/abc").is_ok());
        assert!(validate_url("open.spotify.com/track/1").is_ok());
        assert!(validate_url("https://example.com/video%20name#t=3").is_ok());
    }

    #[test]
    fn test_validate_url_empty() {
        let result = validate_url("   \t\n");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_url_invalid_scheme() {
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_validate_url_rejects_option_lookalikes() {
        assert!(validate_url("--exec=rm").is_err());
    }

    #[test]
    fn test_validate_url_too_long() {
        let long_url = format!("https://example.com/{}", "x".repeat(MAX_URL_LENGTH));
        assert!(validate_url(&long_url).unwrap_err().to_string().contains("too long"));
    }

    #[test]
    fn test_validate_url_rejects_shell_metacharacters() {
        for bad in ["|cat", ";rm", "$HOME", "`whoami`", "\nls", "(x)", "<x>"] {
            let url = format!("https://example.com/video{}", bad);
            assert!(validate_url(&url).is_err(), "{url:?}");
        }
    }

    // ========================================
    // Download Path Tests
    // ========================================

    #[test]
    fn test_validate_download_path() {
        assert!(validate_download_path("/home/user/Music").is_ok());
        assert!(validate_download_path(" ").is_err());
        let long_path = "/".to_string() + &"x".repeat(MAX_DOWNLOAD_PATH_LENGTH);
        assert!(validate_download_path(&long_path).is_err());
    }

    #[test]
    fn test_output_dir_by_kind() {
        assert_eq!(output_dir("/dl", MediaKind::Audio), Path::new("/dl/Audio"));
        assert_eq!(output_dir("/dl", MediaKind::Video), Path::new("/dl/Video"));
    }

    // ========================================
    // Format Argument Tests
    // ========================================

    #[test]
    fn test_build_format_args_audio() {
        let args = build_format_args("bestaudio", MediaKind::Audio);
        assert_eq!(args, ["-f", "bestaudio", "-x", "--audio-format", "mp3"]);
    }

    #[test]
    fn test_build_format_args_video() {
        let args = build_format_args("best[ext=mp4]/best", MediaKind::Video);
        assert_eq!(args, ["-f", "best[ext=mp4]/best", "--merge-output-format", "mp4"]);
    }

    // ========================================
    // Settings Store Tests
    // ========================================

    #[tokio::test]
    async fn test_missing_settings_file_without_default_dir_is_not_configured() {
        let store = scratch_store();
        let err = store.load().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ECfgNotConfigured);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_missing_settings_file_creates_defaults() {
        let downloads = scratch_dir("downloads");
        let store = SettingsStore::new(scratch_dir("settings")).with_default_download_dir(Some(downloads.clone()));

        let settings = store.load().await.unwrap();

        assert_eq!(Path::new(&settings.download_path), downloads);
        assert!(settings.enable_thumbnails);
        assert!(store.path().exists());
        assert_eq!(store.load().await.unwrap(), settings);

        let _ = std::fs::remove_dir_all(store.config_dir());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = scratch_store();
        let settings = AppSettings {
            download_path: "/media/downloads".into(),
            enable_thumbnails: false,
        };

        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);

        let _ = std::fs::remove_dir_all(store.config_dir());
    }

    #[tokio::test]
    async fn test_save_rejects_blank_path() {
        let store = scratch_store();
        assert!(store.save(&AppSettings::new("")).await.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_settings_file() {
        let store = scratch_store();
        std::fs::create_dir_all(store.config_dir()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        let err = store.load().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EIntSerializeFailed);

        let _ = std::fs::remove_dir_all(store.config_dir());
    }
}
