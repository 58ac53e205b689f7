pub mod backend;
pub mod downloader;
pub mod error;
pub mod events;
pub mod logging;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

pub use backend::{AppSettings, Backend, DownloadRequest, MediaKind, PlaylistEntry};
pub use downloader::{SettingsStore, YtDlpBackend};
pub use error::DownloaderError;
pub use events::{EVT_DOWNLOAD_STATUS, EventBus, StatusEvent};
pub use logging::Logger;
pub use session::{DownloadStart, Session, SessionSnapshot};

/// Wire a session to the yt-dlp backend.
///
/// Settings live in `config_dir` and logs in `log_dir` (stderr when `None`).
/// Call [`Session::start`] afterwards to begin listening.
pub fn yt_dlp_session(config_dir: impl Into<PathBuf>, log_dir: Option<PathBuf>) -> Session {
    let bus = EventBus::new();
    let logger = log_dir.map(Logger::new).unwrap_or_default();
    let backend = YtDlpBackend::new(bus.clone(), logger.clone(), SettingsStore::new(config_dir));
    Session::new(Arc::new(backend), bus, logger)
}

/// [`yt_dlp_session`] with the config directory taken from `YEYO_CONFIG_DIR`.
pub fn yt_dlp_session_from_env(log_dir: Option<PathBuf>) -> Result<Session, DownloaderError> {
    let store = SettingsStore::from_env()?;
    Ok(yt_dlp_session(store.config_dir().to_path_buf(), log_dir))
}
