//! Download status feed and the reconciliation of pushed events against it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{STATUS_CANCELLED, STATUS_DOWNLOADING, STATUS_ERROR, STATUS_SUCCESS, StatusEvent};

pub const FETCHING_TITLE: &str = "Fetching title...";
pub const PREPARING_DOWNLOAD: &str = "Preparing to download...";

/// Identity of a status record. Random, so two records never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusId(Uuid);

impl StatusId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StatusId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Downloading,
    Success,
    Error,
    Cancelled,
}

impl RecordStatus {
    pub fn from_wire(status: &str) -> Option<Self> {
        match status {
            STATUS_DOWNLOADING => Some(Self::Downloading),
            STATUS_SUCCESS => Some(Self::Success),
            STATUS_ERROR => Some(Self::Error),
            STATUS_CANCELLED => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Downloading)
    }
}

/// One user-visible download attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: StatusId,
    pub title: String,
    pub status: RecordStatus,
    pub message: String,
    /// Correlation id handed to the backend once the download call is issued.
    pub download_id: Option<String>,
}

impl StatusRecord {
    pub fn downloading(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: StatusId::new(),
            title: title.into(),
            status: RecordStatus::Downloading,
            message: message.into(),
            download_id: None,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Error,
            ..Self::downloading(title, message)
        }
    }

    pub fn is_downloading(&self) -> bool {
        self.status == RecordStatus::Downloading
    }

    /// Move to `status` unless already terminal. Returns whether it changed.
    fn transition(&mut self, status: RecordStatus, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.message = message.into();
        true
    }
}

/// How a pushed event found its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMatch {
    /// The record carrying the event's download id.
    DownloadId(StatusId),
    /// No id match; the newest record still downloading was used.
    FirstDownloading(StatusId),
    /// Nothing to update.
    Unmatched,
    /// The status string is not one we know; flags were still updated.
    UnknownStatus,
}

/// Process-wide download feed plus the in-flight correlation state.
#[derive(Debug, Clone, Default)]
pub struct DownloadSessionState {
    records: Vec<StatusRecord>,
    current_download_id: Option<String>,
    is_downloading: bool,
}

impl DownloadSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, newest first.
    pub fn records(&self) -> &[StatusRecord] {
        &self.records
    }

    pub fn record(&self, id: StatusId) -> Option<&StatusRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn record_mut(&mut self, id: StatusId) -> Option<&mut StatusRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn current_download_id(&self) -> Option<&str> {
        self.current_download_id.as_deref()
    }

    pub fn is_downloading(&self) -> bool {
        self.is_downloading
    }

    pub fn push(&mut self, record: StatusRecord) -> StatusId {
        let id = record.id;
        self.records.insert(0, record);
        id
    }

    /// A user-initiated download is in flight.
    pub fn mark_downloading(&mut self) {
        self.is_downloading = true;
    }

    /// A user-initiated download ended before the backend took over.
    pub fn mark_idle(&mut self) {
        self.is_downloading = false;
    }

    /// A download call for `download_id` was rejected. Clears the in-flight
    /// marker unless another download has since been adopted.
    pub fn release(&mut self, download_id: &str) {
        match self.current_download_id.as_deref() {
            Some(current) if current == download_id => self.clear_current(),
            Some(_) => {}
            None => self.mark_idle(),
        }
    }

    /// Drop the in-flight marker and correlation id without touching records.
    pub fn clear_current(&mut self) {
        self.current_download_id = None;
        self.is_downloading = false;
    }

    pub fn clear_records(&mut self) {
        self.records.clear();
    }

    /// Swap the placeholder title for the resolved one.
    pub fn resolve_title(&mut self, id: StatusId, title: &str) -> bool {
        let Some(record) = self.record_mut(id) else {
            return false;
        };
        record.title = title.to_string();
        if record.is_downloading() {
            record.message = PREPARING_DOWNLOAD.to_string();
        }
        true
    }

    pub fn attach_download_id(&mut self, id: StatusId, download_id: &str) -> bool {
        match self.record_mut(id) {
            Some(record) => {
                record.download_id = Some(download_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Mark a record failed. Terminal records are left alone.
    pub fn fail(&mut self, id: StatusId, message: impl Into<String>) -> bool {
        self.record_mut(id).is_some_and(|r| r.transition(RecordStatus::Error, message))
    }

    /// Fail the newest record with this title that is still downloading.
    pub fn fail_by_title(&mut self, title: &str, message: impl Into<String>) -> bool {
        self.records
            .iter_mut()
            .find(|r| r.title == title && r.is_downloading())
            .is_some_and(|r| r.transition(RecordStatus::Error, message))
    }

    /// Apply a pushed `DOWNLOAD_STATUS` event.
    pub fn apply_event(&mut self, event: &StatusEvent) -> EventMatch {
        let status = RecordStatus::from_wire(&event.status);

        match (status, event.download_id.as_deref()) {
            (Some(RecordStatus::Downloading), Some(download_id)) => {
                self.current_download_id = Some(download_id.to_string());
                self.is_downloading = true;
            }
            (Some(RecordStatus::Downloading), None) => {}
            _ => self.clear_current(),
        }

        let Some(status) = status else {
            return EventMatch::UnknownStatus;
        };

        if let Some(download_id) = event.download_id.as_deref()
            && let Some(record) = self.records.iter_mut().find(|r| r.download_id.as_deref() == Some(download_id))
        {
            let id = record.id;
            return if record.transition(status, event.message.as_str()) {
                EventMatch::DownloadId(id)
            } else {
                EventMatch::Unmatched
            };
        }

        match self.records.iter_mut().find(|r| r.is_downloading()) {
            Some(record) => {
                record.transition(status, event.message.as_str());
                EventMatch::FirstDownloading(record.id)
            }
            None => EventMatch::Unmatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_is_newest_first() {
        let mut state = DownloadSessionState::new();
        let a = state.push(StatusRecord::downloading("A", PREPARING_DOWNLOAD));
        let b = state.push(StatusRecord::downloading("B", PREPARING_DOWNLOAD));
        assert_ne!(a, b);
        assert_eq!(state.records()[0].id, b);
        assert_eq!(state.records()[1].id, a);
    }

    #[test]
    fn test_terminal_records_never_change() {
        let mut state = DownloadSessionState::new();
        let id = state.push(StatusRecord::downloading("A", PREPARING_DOWNLOAD));

        assert!(state.fail(id, "boom"));
        assert!(!state.fail(id, "again"));
        assert_eq!(state.record(id).unwrap().message, "boom");

        let outcome = state.apply_event(&StatusEvent::new("success", "done", None));
        assert_eq!(outcome, EventMatch::Unmatched);
        assert_eq!(state.record(id).unwrap().status, RecordStatus::Error);
    }

    #[test]
    fn test_success_event_with_single_downloading_record() {
        let mut state = DownloadSessionState::new();
        state.push(StatusRecord::error("old", "failed earlier"));
        let id = state.push(StatusRecord::downloading("Song A", PREPARING_DOWNLOAD));
        state.apply_event(&StatusEvent::downloading("d1", "Starting download..."));
        assert_eq!(state.current_download_id(), Some("d1"));
        assert!(state.is_downloading());

        let outcome = state.apply_event(&StatusEvent::success("d1", "done"));

        assert_eq!(outcome, EventMatch::FirstDownloading(id));
        let record = state.record(id).unwrap();
        assert_eq!(record.status, RecordStatus::Success);
        assert_eq!(record.message, "done");
        assert_eq!(state.current_download_id(), None);
        assert!(!state.is_downloading());
    }

    #[test]
    fn test_events_correlate_by_download_id_first() {
        let mut state = DownloadSessionState::new();
        let first = state.push(StatusRecord::downloading("First", PREPARING_DOWNLOAD));
        state.attach_download_id(first, "d1");
        let second = state.push(StatusRecord::downloading("Second", PREPARING_DOWNLOAD));
        state.attach_download_id(second, "d2");

        // The newest downloading record is `second`, but the id points at `first`.
        let outcome = state.apply_event(&StatusEvent::success("d1", "first done"));

        assert_eq!(outcome, EventMatch::DownloadId(first));
        assert_eq!(state.record(first).unwrap().status, RecordStatus::Success);
        assert_eq!(state.record(second).unwrap().status, RecordStatus::Downloading);
    }

    #[test]
    fn test_progress_event_updates_message_only() {
        let mut state = DownloadSessionState::new();
        let id = state.push(StatusRecord::downloading("A", PREPARING_DOWNLOAD));
        state.attach_download_id(id, "d1");

        state.apply_event(&StatusEvent::downloading("d1", "Downloading... 42.0%"));

        let record = state.record(id).unwrap();
        assert_eq!(record.status, RecordStatus::Downloading);
        assert_eq!(record.message, "Downloading... 42.0%");
    }

    #[test]
    fn test_downloading_event_without_id_keeps_flags() {
        let mut state = DownloadSessionState::new();
        state.push(StatusRecord::downloading("A", PREPARING_DOWNLOAD));

        state.apply_event(&StatusEvent::new("downloading", "Starting download...", None));

        assert_eq!(state.current_download_id(), None);
        assert!(!state.is_downloading());
    }

    #[test]
    fn test_unknown_status_clears_flags_but_keeps_records() {
        let mut state = DownloadSessionState::new();
        let id = state.push(StatusRecord::downloading("A", PREPARING_DOWNLOAD));
        state.apply_event(&StatusEvent::downloading("d1", "Starting download..."));

        let outcome = state.apply_event(&StatusEvent::new("paused", "??", Some("d1")));

        assert_eq!(outcome, EventMatch::UnknownStatus);
        assert!(!state.is_downloading());
        assert_eq!(state.record(id).unwrap().status, RecordStatus::Downloading);
    }

    #[test]
    fn test_fail_by_title_only_hits_downloading_records() {
        let mut state = DownloadSessionState::new();
        let done = state.push(StatusRecord::downloading("Same", PREPARING_DOWNLOAD));
        state.apply_event(&StatusEvent::new("success", "ok", None));
        let live = state.push(StatusRecord::downloading("Same", PREPARING_DOWNLOAD));

        assert!(state.fail_by_title("Same", "rejected"));
        assert_eq!(state.record(done).unwrap().status, RecordStatus::Success);
        assert_eq!(state.record(live).unwrap().status, RecordStatus::Error);
        assert!(!state.fail_by_title("Missing", "rejected"));
    }

    #[test]
    fn test_release_after_rejected_call() {
        let mut state = DownloadSessionState::new();
        state.mark_downloading();
        state.release("d1");
        assert!(!state.is_downloading());

        // The rejected id had been adopted from its first event.
        state.apply_event(&StatusEvent::downloading("d1", "Starting download..."));
        state.release("d1");
        assert_eq!(state.current_download_id(), None);
        assert!(!state.is_downloading());

        // Another download is running; leave it alone.
        state.apply_event(&StatusEvent::downloading("d2", "Starting download..."));
        state.release("d1");
        assert_eq!(state.current_download_id(), Some("d2"));
        assert!(state.is_downloading());
    }

    #[test]
    fn test_resolve_title_keeps_id() {
        let mut state = DownloadSessionState::new();
        let id = state.push(StatusRecord::downloading(FETCHING_TITLE, "Getting title for x"));

        assert!(state.resolve_title(id, "Song A"));

        let record = state.record(id).unwrap();
        assert_eq!(record.title, "Song A");
        assert_eq!(record.message, PREPARING_DOWNLOAD);
        assert_eq!(state.records().len(), 1);
    }

    #[test]
    fn test_record_serializes_with_its_id() {
        let record = StatusRecord::downloading("Song A", PREPARING_DOWNLOAD);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], record.id.to_string());
        assert_eq!(json["status"], "downloading");

        let back: StatusRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_wire_status_round_trip() {
        for wire in ["downloading", "success", "error", "cancelled"] {
            let status = RecordStatus::from_wire(wire).unwrap();
            assert_eq!(serde_json::to_value(status).unwrap(), wire);
        }
        assert!(RecordStatus::from_wire("Success").is_none());
    }
}
