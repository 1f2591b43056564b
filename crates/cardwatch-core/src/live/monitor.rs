// ── Connection monitor ──
//
// Observable connection status plus a free-text "last event" label.
// Writers are crate-private: only the stream client's lifecycle
// callbacks (and the dashboard's hard reset) move it.

use std::sync::Arc;

use cardwatch_api::StreamEvent;
use serde::Serialize;
use tokio::sync::watch;

/// Connection state observable by consumers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Label shown when the stream opens or a keep-alive arrives.
pub(crate) const CONNECTED_LABEL: &str = "Connected";

/// Shared, cheaply cloneable connection status.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    state: watch::Sender<ConnectionState>,
    last_event: watch::Sender<Option<String>>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (last_event, _) = watch::channel(None);
        Self {
            inner: Arc::new(MonitorInner { state, last_event }),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn last_event(&self) -> Option<String> {
        self.inner.last_event.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to "last event" label changes.
    pub fn subscribe_last_event(&self) -> watch::Receiver<Option<String>> {
        self.inner.last_event.subscribe()
    }

    // ── Writes (crate-private) ───────────────────────────────────────

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.inner.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    pub(crate) fn on_open(&self) {
        self.set_state(ConnectionState::Connected);
        self.set_label(CONNECTED_LABEL.to_owned());
    }

    /// Update the label for a decoded event. Never touches state.
    pub(crate) fn on_event(&self, event: &StreamEvent) {
        self.set_label(label_for(event));
    }

    pub(crate) fn reset(&self) {
        self.set_state(ConnectionState::Disconnected);
        self.inner.last_event.send_replace(None);
    }

    fn set_label(&self, label: String) {
        self.inner.last_event.send_replace(Some(label));
    }
}

/// Human-readable label for an event.
pub fn label_for(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Attendance(e) => format!("{} - {}", e.user.name, e.direction),
        StreamEvent::Unknown(e) => format!("Unknown UID: {}", e.uid),
        StreamEvent::Ignored(e) => format!("Ignored: {}", e.reason),
        StreamEvent::Ping => CONNECTED_LABEL.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cardwatch_api::{AttendanceEvent, Direction, IgnoreReason, IgnoredEvent, UnknownEvent, UserRef};
    use chrono::Utc;

    fn attendance(name: &str, direction: Direction) -> StreamEvent {
        StreamEvent::Attendance(AttendanceEvent {
            uid: "A1".into(),
            user: UserRef {
                id: 1,
                name: name.into(),
            },
            direction,
            ts: Utc::now(),
        })
    }

    #[test]
    fn starts_disconnected_without_label() {
        let monitor = ConnectionMonitor::new();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert!(monitor.last_event().is_none());
    }

    #[test]
    fn open_sets_connected_label() {
        let monitor = ConnectionMonitor::new();
        monitor.on_open();
        assert!(monitor.is_connected());
        assert_eq!(monitor.last_event().as_deref(), Some("Connected"));
    }

    #[test]
    fn labels_follow_event_kind() {
        let monitor = ConnectionMonitor::new();
        let ts = Utc::now();

        monitor.on_event(&attendance("Ada", Direction::In));
        assert_eq!(monitor.last_event().as_deref(), Some("Ada - IN"));

        monitor.on_event(&StreamEvent::Unknown(UnknownEvent {
            uid: "ZZ9".into(),
            ts,
        }));
        assert_eq!(monitor.last_event().as_deref(), Some("Unknown UID: ZZ9"));

        monitor.on_event(&StreamEvent::Ignored(IgnoredEvent {
            uid: "B2".into(),
            reason: IgnoreReason::Burst,
            seconds_left: None,
            user: None,
            ts,
        }));
        assert_eq!(monitor.last_event().as_deref(), Some("Ignored: burst"));

        monitor.on_event(&StreamEvent::Ping);
        assert_eq!(monitor.last_event().as_deref(), Some("Connected"));
    }

    #[test]
    fn events_never_change_state() {
        let monitor = ConnectionMonitor::new();
        monitor.on_open();
        monitor.on_event(&attendance("Bob", Direction::Out));
        monitor.on_event(&StreamEvent::Ping);
        assert_eq!(monitor.state(), ConnectionState::Connected);
    }

    #[test]
    fn redundant_state_writes_do_not_notify() {
        let monitor = ConnectionMonitor::new();
        let mut rx = monitor.subscribe_state();
        monitor.set_state(ConnectionState::Disconnected);
        assert!(!rx.has_changed().unwrap());
        monitor.set_state(ConnectionState::Connecting);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn reset_clears_label() {
        let monitor = ConnectionMonitor::new();
        monitor.on_open();
        monitor.reset();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert!(monitor.last_event().is_none());
    }
}
