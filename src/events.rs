//! Pushed events shared between the download bridge and the session.
//! Keep the names in sync with the view layer's event listeners.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const EVT_DOWNLOAD_STATUS: &str = "DOWNLOAD_STATUS";

/// Wire status strings carried by [`StatusEvent::status`].
pub const STATUS_DOWNLOADING: &str = "downloading";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Buffered events per subscriber before a slow listener starts lagging.
const EVENT_BUFFER: usize = 256;

/// Payload of a `DOWNLOAD_STATUS` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
}

impl StatusEvent {
    pub fn new(status: &str, message: impl Into<String>, download_id: Option<&str>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            download_id: download_id.map(str::to_string),
        }
    }

    pub fn downloading(download_id: &str, message: impl Into<String>) -> Self {
        Self::new(STATUS_DOWNLOADING, message, Some(download_id))
    }

    pub fn success(download_id: &str, message: impl Into<String>) -> Self {
        Self::new(STATUS_SUCCESS, message, Some(download_id))
    }

    pub fn error(download_id: &str, message: impl Into<String>) -> Self {
        Self::new(STATUS_ERROR, message, Some(download_id))
    }

    pub fn cancelled(download_id: &str, message: impl Into<String>) -> Self {
        Self::new(STATUS_CANCELLED, message, Some(download_id))
    }
}

/// Fan-out channel for `DOWNLOAD_STATUS` events.
///
/// Emitting never fails: with no subscribers the event is simply dropped,
/// matching a webview that is not listening yet.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn emit(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event_wire_format() {
        let json = serde_json::to_value(StatusEvent::success("d1", "done")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success", "message": "done", "download_id": "d1"}));
    }

    #[test]
    fn test_status_event_without_download_id() {
        let event: StatusEvent = serde_json::from_str(r#"{"status":"success","message":"ok"}"#).unwrap();
        assert_eq!(event.download_id, None);

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("download_id"));
    }

    #[tokio::test]
    async fn test_bus_fans_out_to_every_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.listener_count(), 2);

        bus.emit(StatusEvent::downloading("d1", "Starting download..."));

        assert_eq!(a.recv().await.unwrap().status, STATUS_DOWNLOADING);
        assert_eq!(b.recv().await.unwrap().download_id.as_deref(), Some("d1"));
    }

    #[test]
    fn test_emit_without_listeners_is_silent() {
        let bus = EventBus::default();
        bus.emit(StatusEvent::error("d1", "boom"));
        assert_eq!(bus.listener_count(), 0);
    }
}
