//! yt-dlp backed implementation of the [`Backend`] bridge.
//!
//! Every call shells out to yt-dlp (or fetches a Spotify page first) and
//! download progress is pushed on the shared [`EventBus`].
//!
//! ## Module Structure
//! - `playlist` - Flat-playlist output parsing
//! - `progress` - Progress line parsing
//! - `settings` - Settings store, yt-dlp config and validation
//! - `spotify` - Spotify page title lookup
//! - `subprocess` - Download process management and cancellation
//! - `ytdlp` - One-shot yt-dlp execution

mod playlist;
mod progress;
mod settings;
mod spotify;
mod subprocess;
mod ytdlp;

pub use playlist::parse_flat_playlist;
pub use settings::{SettingsStore, YtDlpConfig, validate_download_path, validate_url};
pub use spotify::clean_spotify_title;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::backend::{AppSettings, Backend, DownloadRequest, PlaylistEntry};
use crate::error::DownloaderError;
use crate::events::{EventBus, StatusEvent};
use crate::logging::{ErrorCategory, Logger};

use subprocess::{CancelFlags, DownloadOutcome, build_download_args, run_download};

pub const STARTING_DOWNLOAD: &str = "Starting download...";
pub const DOWNLOAD_CANCELLED: &str = "Download cancelled";

pub struct YtDlpBackend {
    bus: EventBus,
    logger: Logger,
    store: SettingsStore,
    config: YtDlpConfig,
    http: Client,
    cancel_flags: CancelFlags,
}

impl YtDlpBackend {
    /// Backend using the yt-dlp binary named by `YEYO_YT_DLP` (or `yt-dlp` on PATH).
    pub fn new(bus: EventBus, logger: Logger, store: SettingsStore) -> Self {
        Self {
            bus,
            logger,
            store,
            config: YtDlpConfig::from_env(),
            http: Client::new(),
            cancel_flags: CancelFlags::default(),
        }
    }

    pub fn with_config(mut self, config: YtDlpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.store
    }

    /// What yt-dlp should be pointed at: Spotify links become a YouTube search.
    async fn resolve_target(&self, url: &str) -> Result<String, DownloaderError> {
        if !spotify::is_spotify_page(url) {
            return Ok(url.to_string());
        }
        let title = spotify::fetch_title(&self.http, url).await?;
        self.logger.debug(ErrorCategory::Network, &format!("Spotify link resolved to '{}'", title));
        Ok(spotify::search_target(&title))
    }

    async fn run(&self, args: Vec<String>) -> Result<ytdlp::YtDlpOutput, DownloaderError> {
        let mut cmd = ytdlp::command(&self.config);
        cmd.args(args);
        ytdlp::run_yt_dlp(&mut cmd).await.map_err(|e| DownloaderError::spawn(format!("spawn yt-dlp failed: {e}")))
    }

    /// Playlist thumbnails follow the saved preference; unreadable settings keep them on.
    async fn thumbnails_enabled(&self) -> bool {
        match self.store.load().await {
            Ok(settings) => settings.enable_thumbnails,
            Err(e) => {
                self.logger.debug(ErrorCategory::Settings, &format!("Settings not available for playlist listing: {}", e));
                true
            }
        }
    }

    async fn execute(&self, request: &DownloadRequest, cancel_flag: &AtomicBool) -> Result<DownloadOutcome, DownloaderError> {
        let settings = self.store.load().await?;
        validate_download_path(&settings.download_path)?;
        validate_url(&request.url)?;

        let target = self.resolve_target(&request.url).await?;
        let output_dir = settings::output_dir(&settings.download_path, request.format_type);
        let args = build_download_args(&target, &request.quality, request.format_type, &output_dir);

        // Cancelled while settings or the Spotify title were loading
        if cancel_flag.load(Ordering::Relaxed) {
            return Ok(DownloadOutcome::Cancelled);
        }

        run_download(&self.config, &args, &request.download_id, cancel_flag, &self.bus, &self.logger).await
    }
}

#[async_trait]
impl Backend for YtDlpBackend {
    async fn get_media_title(&self, url: &str) -> Result<String, DownloaderError> {
        validate_url(url)?;
        let target = self.resolve_target(url).await?;

        let out = self.run(ytdlp::title_args(&target)).await?;
        if !out.success {
            return Err(DownloaderError::process(format!("Failed to get media title: {}", out.stderr.trim())));
        }

        out.stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DownloaderError::empty_output("yt-dlp did not return a filename"))
    }

    async fn get_playlist_info(&self, url: &str) -> Result<Vec<PlaylistEntry>, DownloaderError> {
        validate_url(url)?;

        let out = self.run(ytdlp::playlist_args(url)).await?;
        if !out.success {
            self.logger.error_with_context(
                ErrorCategory::Download,
                "yt-dlp playlist listing failed",
                json!({ "url": url }),
                Some(&out.stderr),
            );
            return Err(DownloaderError::process(format!("yt-dlp command failed: {}", out.stderr.trim())));
        }

        parse_flat_playlist(&out.stdout, self.thumbnails_enabled().await)
    }

    async fn download_media(&self, request: DownloadRequest) -> Result<(), DownloaderError> {
        let id = request.download_id.as_str();
        // Registered before the first event so a cancel can never miss it.
        let Some(flag) = self.cancel_flags.register(id) else {
            let error = DownloaderError::internal(format!("Download {} is already running", id));
            self.logger.warn(ErrorCategory::Download, &error.to_string());
            return Err(error);
        };

        self.bus.emit(StatusEvent::downloading(id, STARTING_DOWNLOAD));
        self.logger.info(ErrorCategory::Download, &format!("Starting download {} for {}", id, request.url));

        let result = self.execute(&request, &flag).await;
        self.cancel_flags.remove(id);

        let error = match result {
            Ok(DownloadOutcome::Success(message)) => {
                self.bus.emit(StatusEvent::success(id, message));
                return Ok(());
            }
            Ok(DownloadOutcome::Cancelled) => {
                self.bus.emit(StatusEvent::cancelled(id, DOWNLOAD_CANCELLED));
                self.logger.info(ErrorCategory::Download, &format!("Download {} cancelled", id));
                return Ok(());
            }
            Ok(DownloadOutcome::Failed(details)) => DownloaderError::process(details),
            Err(e) => e,
        };

        self.logger.error_with_context(
            ErrorCategory::Download,
            "Download failed",
            json!({
                "download_id": id,
                "url": request.url,
                "code": error.code(),
                "retryable": error.code().is_retryable(),
            }),
            Some(&error.to_string()),
        );
        self.bus.emit(StatusEvent::error(id, error.to_string()));
        Err(error)
    }

    async fn cancel_download(&self, download_id: &str) -> Result<(), DownloaderError> {
        if self.cancel_flags.request(download_id) {
            Ok(())
        } else {
            Err(DownloaderError::unknown_download(download_id))
        }
    }

    async fn load_settings(&self) -> Result<AppSettings, DownloaderError> {
        self.store.load().await
    }

    async fn save_settings(&self, settings: AppSettings) -> Result<(), DownloaderError> {
        self.store.save(&settings).await
    }
}
