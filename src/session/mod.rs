//! Session state shared by every view of the downloader.
//!
//! A [`Session`] is the single writer for the URL form, the format choice,
//! the playlist browser, the download status feed and the settings gate.
//! Views read [`SessionSnapshot`]s and call the intention-revealing
//! operations below; nothing else mutates the state.
//!
//! ## Module Structure
//! - `classify` - URL facet detection
//! - `formats` - Output format catalog and selection
//! - `playlist` - Playlist entries and selection
//! - `settings_gate` - Configured / unconfigured tracking
//! - `status` - Status records and pushed-event reconciliation

pub mod classify;
pub mod formats;
pub mod playlist;
pub mod settings_gate;
pub mod status;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::{AppSettings, Backend, DownloadRequest, MediaKind, PlaylistEntry};
use crate::error::DownloaderError;
use crate::events::{EventBus, StatusEvent};
use crate::logging::{ErrorCategory, Logger};

use classify::UrlFacets;
use formats::FormatSelection;
use playlist::{FetchTicket, PLAYLIST_FETCH_FAILED, PlaylistSession, entry_watch_url};
use settings_gate::SettingsGate;
use status::{DownloadSessionState, EventMatch, FETCHING_TITLE, PREPARING_DOWNLOAD, StatusId, StatusRecord};

pub use status::RecordStatus;

/// What a download trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStart {
    /// A guard rejected the trigger; nothing changed.
    Skipped,
    /// One record was created for the URL in the form.
    Single(StatusId),
    /// One record per selected playlist entry, in playlist order.
    Batch(Vec<StatusId>),
}

/// Read-only copy of the session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub url: String,
    pub facets: UrlFacets,
    pub format_id: &'static str,
    pub statuses: Vec<StatusRecord>,
    pub current_download_id: Option<String>,
    pub is_downloading: bool,
    pub needs_config: bool,
    pub playlist_entries: Vec<PlaylistEntry>,
    pub selected_entries: Vec<String>,
    pub is_fetching_playlist: bool,
    pub has_tried_fetch: bool,
    pub can_download: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    url: String,
    facets: UrlFacets,
    format: FormatSelection,
    downloads: DownloadSessionState,
    playlist: PlaylistSession,
    gate: SettingsGate,
}

impl SessionState {
    fn can_download(&self) -> bool {
        if self.downloads.is_downloading() || self.gate.needs_config() {
            return false;
        }
        if self.facets.is_playlist {
            !self.playlist.selected().is_empty()
        } else {
            !self.url.trim().is_empty()
        }
    }
}

/// Work captured under the lock when a trigger passes its guards.
enum Planned {
    Single {
        record: StatusId,
        url: String,
        quality: &'static str,
        kind: MediaKind,
    },
    Batch {
        entries: Vec<PlaylistEntry>,
        quality: &'static str,
        kind: MediaKind,
    },
}

struct Shared {
    backend: Arc<dyn Backend>,
    logger: Logger,
    state: Mutex<SessionState>,
}

impl Shared {
    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    async fn refresh_settings(&self) -> Result<AppSettings, DownloaderError> {
        let loaded = self.backend.load_settings().await;
        self.with_state(|s| s.gate.observe(&loaded));
        if let Err(e) = &loaded {
            self.logger.debug(ErrorCategory::Settings, &format!("Settings not available: {}", e));
        }
        loaded
    }

    fn apply_event(&self, event: &StatusEvent) {
        let matched = self.with_state(|s| s.downloads.apply_event(event));
        match matched {
            EventMatch::DownloadId(_) => {}
            EventMatch::FirstDownloading(record) => self.logger.warn_with_context(
                ErrorCategory::Download,
                "Status event correlated by first downloading record",
                json!({ "record": record.to_string(), "download_id": event.download_id, "status": event.status }),
            ),
            EventMatch::Unmatched => self.logger.debug(
                ErrorCategory::Download,
                &format!("Status event '{}' matched no downloading record", event.status),
            ),
            EventMatch::UnknownStatus => self.logger.warn_with_context(
                ErrorCategory::Download,
                "Status event with unknown status",
                json!({ "download_id": event.download_id, "status": event.status }),
            ),
        }
    }
}

/// The downloader session. Owns its event listener between [`Session::start`]
/// and [`Session::stop`] (or drop).
pub struct Session {
    shared: Arc<Shared>,
    bus: EventBus,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(backend: Arc<dyn Backend>, bus: EventBus, logger: Logger) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                logger,
                state: Mutex::new(SessionState::default()),
            }),
            bus,
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to `DOWNLOAD_STATUS` (once) and load settings.
    pub async fn start(&self) {
        {
            let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
            let running = listener.as_ref().is_some_and(|h| !h.is_finished());
            if !running {
                let rx = self.bus.subscribe();
                *listener = Some(tokio::spawn(listen(Arc::clone(&self.shared), rx)));
                self.shared.logger.info(ErrorCategory::System, "Download status listener started");
            }
        }
        let _ = self.shared.refresh_settings().await;
    }

    /// Unsubscribe. Records and flags are kept.
    pub fn stop(&self) {
        let handle = self.listener.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            self.shared.logger.info(ErrorCategory::System, "Download status listener stopped");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.with_state(|s| {
            let mut selected_entries: Vec<String> = s.playlist.selected().iter().cloned().collect();
            selected_entries.sort();
            SessionSnapshot {
                url: s.url.clone(),
                facets: s.facets,
                format_id: s.format.current().id,
                statuses: s.downloads.records().to_vec(),
                current_download_id: s.downloads.current_download_id().map(str::to_string),
                is_downloading: s.downloads.is_downloading(),
                needs_config: s.gate.needs_config(),
                playlist_entries: s.playlist.entries().to_vec(),
                selected_entries,
                is_fetching_playlist: s.playlist.is_fetching(),
                has_tried_fetch: s.playlist.has_tried_fetch(),
                can_download: s.can_download(),
            }
        })
    }

    pub fn statuses(&self) -> Vec<StatusRecord> {
        self.shared.with_state(|s| s.downloads.records().to_vec())
    }

    pub fn is_downloading(&self) -> bool {
        self.shared.with_state(|s| s.downloads.is_downloading())
    }

    pub fn current_download_id(&self) -> Option<String> {
        self.shared.with_state(|s| s.downloads.current_download_id().map(str::to_string))
    }

    pub fn needs_config(&self) -> bool {
        self.shared.with_state(|s| s.gate.needs_config())
    }

    pub fn can_download(&self) -> bool {
        self.shared.with_state(|s| s.can_download())
    }

    /// Replace the URL. Resets playlist state and, for playlist URLs, fetches
    /// the entries before returning.
    pub async fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        let ticket = self.shared.with_state(|s| {
            if s.url == url {
                return None;
            }
            let previous = s.facets;
            let facets = UrlFacets::of(&url);
            s.url = url.clone();
            s.facets = facets;
            s.format.observe_facets(previous, facets);
            s.playlist.reset_for_url_change();
            facets.is_playlist.then(|| s.playlist.begin_fetch())
        });

        if let Some(ticket) = ticket {
            self.fetch_playlist(&url, ticket).await;
        }
    }

    async fn fetch_playlist(&self, url: &str, ticket: FetchTicket) {
        let result = self.shared.backend.get_playlist_info(url).await;
        let failure = result.as_ref().err().map(|e| e.to_string());

        let (landed, pushed_error) = self.shared.with_state(|s| match result {
            Ok(entries) => (s.playlist.finish_fetch(ticket, entries), false),
            Err(e) => {
                if s.playlist.fail_fetch(ticket) {
                    s.downloads.push(StatusRecord::error(PLAYLIST_FETCH_FAILED, e.to_string()));
                    (true, true)
                } else {
                    (false, false)
                }
            }
        });

        if !landed {
            self.shared.logger.debug(ErrorCategory::Download, &format!("Discarded stale playlist result for {}", url));
            return;
        }
        if pushed_error {
            self.shared.logger.error_with_context(
                ErrorCategory::Download,
                "Failed to fetch playlist info",
                json!({ "url": url }),
                failure.as_deref(),
            );
            let _ = self.shared.refresh_settings().await;
        }
    }

    pub fn select_format(&self, id: &str) -> Result<(), DownloaderError> {
        self.shared.with_state(|s| s.format.select(id).map(|_| ()))
    }

    pub fn toggle_entry(&self, id: &str) -> bool {
        self.shared.with_state(|s| s.playlist.toggle_entry(id))
    }

    pub fn toggle_all(&self) {
        self.shared.with_state(|s| s.playlist.toggle_all());
    }

    /// Start the download for the current form: the single URL, or every
    /// selected playlist entry one after another.
    pub async fn download(&self) -> DownloadStart {
        let planned = self.shared.with_state(|s| {
            if s.downloads.is_downloading() || s.gate.needs_config() {
                return None;
            }
            let format = s.format.current();
            if s.facets.is_playlist {
                let entries = s.playlist.selected_entries();
                if entries.is_empty() {
                    return None;
                }
                return Some(Planned::Batch {
                    entries,
                    quality: format.selector,
                    kind: format.kind,
                });
            }
            if s.url.trim().is_empty() {
                return None;
            }
            s.downloads.mark_downloading();
            let record = s
                .downloads
                .push(StatusRecord::downloading(FETCHING_TITLE, format!("Getting title for {}", s.url)));
            Some(Planned::Single {
                record,
                url: s.url.clone(),
                quality: s.format.selector_for(s.facets),
                kind: format.kind,
            })
        });

        let started = match planned {
            None => return DownloadStart::Skipped,
            Some(Planned::Single {
                record,
                url,
                quality,
                kind,
            }) => {
                self.download_single(record, url, quality, kind).await;
                DownloadStart::Single(record)
            }
            Some(Planned::Batch { entries, quality, kind }) => {
                DownloadStart::Batch(self.download_batch(entries, quality, kind).await)
            }
        };

        let _ = self.shared.refresh_settings().await;
        started
    }

    async fn download_single(&self, record: StatusId, url: String, quality: &str, kind: MediaKind) {
        let title = match self.shared.backend.get_media_title(&url).await {
            Ok(title) => title,
            Err(e) => {
                self.shared.with_state(|s| {
                    s.downloads.fail(record, format!("Failed to get title: {}", e));
                    s.downloads.mark_idle();
                });
                return;
            }
        };

        let download_id = Uuid::new_v4().to_string();
        self.shared.with_state(|s| {
            s.downloads.resolve_title(record, &title);
            s.downloads.attach_download_id(record, &download_id);
        });

        self.issue(record, &title, url, quality, kind, download_id).await;
    }

    async fn download_batch(&self, entries: Vec<PlaylistEntry>, quality: &str, kind: MediaKind) -> Vec<StatusId> {
        let mut records = Vec::with_capacity(entries.len());

        for entry in entries {
            let download_id = Uuid::new_v4().to_string();
            let record = self.shared.with_state(|s| {
                let record = s.downloads.push(StatusRecord::downloading(entry.title.as_str(), PREPARING_DOWNLOAD));
                s.downloads.attach_download_id(record, &download_id);
                record
            });
            records.push(record);

            self.issue(record, &entry.title, entry_watch_url(&entry.id), quality, kind, download_id)
                .await;
        }

        records
    }

    async fn issue(
        &self,
        record: StatusId,
        title: &str,
        url: String,
        quality: &str,
        kind: MediaKind,
        download_id: String,
    ) {
        let request = DownloadRequest {
            url,
            quality: quality.to_string(),
            format_type: kind,
            download_id: download_id.clone(),
        };

        if let Err(e) = self.shared.backend.download_media(request).await {
            // A pushed error event may already have closed the record.
            self.shared.with_state(|s| {
                if s.downloads.record(record).is_some() {
                    s.downloads.fail(record, e.to_string());
                } else {
                    s.downloads.fail_by_title(title, e.to_string());
                }
                s.downloads.release(&download_id);
            });
        }
    }

    /// Cancel the download the backend reported as running.
    ///
    /// Returns true when the backend accepted the cancel. Local state is
    /// cleared without waiting for a `cancelled` event.
    pub async fn cancel(&self) -> bool {
        let Some(download_id) = self.current_download_id() else {
            return false;
        };

        match self.shared.backend.cancel_download(&download_id).await {
            Ok(()) => {
                self.shared.with_state(|s| {
                    if s.downloads.current_download_id() == Some(download_id.as_str()) {
                        s.downloads.clear_current();
                    }
                });
                true
            }
            Err(e) => {
                self.shared.logger.error_with_context(
                    ErrorCategory::Download,
                    "Failed to cancel download",
                    json!({ "download_id": download_id }),
                    Some(&e.to_string()),
                );
                false
            }
        }
    }

    pub async fn clear_statuses(&self) {
        self.shared.with_state(|s| s.downloads.clear_records());
        let _ = self.shared.refresh_settings().await;
    }

    /// Re-read settings and update the gate.
    pub async fn refresh_settings(&self) -> bool {
        self.shared.refresh_settings().await.is_ok() && !self.needs_config()
    }

    pub async fn load_settings(&self) -> Result<AppSettings, DownloaderError> {
        self.shared.refresh_settings().await
    }

    pub async fn save_settings(&self, settings: AppSettings) -> Result<(), DownloaderError> {
        if !settings.is_configured() {
            return Err(DownloaderError::invalid_settings("Download location cannot be empty"));
        }
        self.shared.backend.save_settings(settings).await?;
        self.shared.logger.info(ErrorCategory::Settings, "Settings saved");
        self.shared.refresh_settings().await.map(|_| ())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}

async fn listen(shared: Arc<Shared>, mut rx: broadcast::Receiver<StatusEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                shared.apply_event(&event);
                // Progress only rewrites a message; re-read settings when a download settles.
                if RecordStatus::from_wire(&event.status) != Some(RecordStatus::Downloading) {
                    let _ = shared.refresh_settings().await;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                shared.logger.warn(ErrorCategory::System, &format!("Status listener lagged, {} events dropped", skipped));
            }
            Err(RecvError::Closed) => break,
        }
    }
}
