// ── User-visible notifications ──
//
// Toast-style messages raised by the live layer, snapshot refreshes and
// roster mutations. Delivered over a broadcast channel; a slow consumer
// sees `Lagged` rather than blocking producers.

use std::sync::Arc;

use cardwatch_api::{Direction, IgnoreReason, StreamEvent};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Cooldown shown when the backend omits `secondsLeft`.
const DEFAULT_COOLDOWN_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: Option<String>,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            description,
            raised_at: Utc::now(),
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, title, None)
    }

    /// The notification a stream event raises. `Ping` raises none.
    pub fn for_event(event: &StreamEvent) -> Option<Self> {
        let notification = match event {
            StreamEvent::Attendance(e) => {
                let level = match e.direction {
                    Direction::In => NotificationLevel::Success,
                    Direction::Out => NotificationLevel::Info,
                };
                let at = e.ts.with_timezone(&Local).format("%H:%M:%S");
                Self::new(
                    level,
                    format!("{} - {}", e.user.name, e.direction),
                    Some(format!("Registered at {at}")),
                )
            }
            StreamEvent::Unknown(e) => Self::new(
                NotificationLevel::Warning,
                "Unknown RFID Card",
                Some(format!("UID: {} is not registered", e.uid)),
            ),
            StreamEvent::Ignored(e) => {
                let description = match e.reason {
                    IgnoreReason::Cooldown => format!(
                        "Please wait {}s between check-ins",
                        e.seconds_left
                            .filter(|s| *s > 0)
                            .unwrap_or(DEFAULT_COOLDOWN_SECS)
                    ),
                    IgnoreReason::Burst => "Multiple rapid reads detected".to_owned(),
                };
                Self::new(NotificationLevel::Error, "Read Ignored", Some(description))
            }
            StreamEvent::Ping => return None,
        };
        Some(notification)
    }

    /// A stream transport failure.
    pub fn connection_error(reason: &str) -> Self {
        Self::new(
            NotificationLevel::Error,
            "Connection Error",
            Some(reason.to_owned()),
        )
    }

    /// A failed snapshot refresh.
    pub fn fetch_failed(what: &str, error: &str) -> Self {
        Self::new(
            NotificationLevel::Warning,
            format!("Failed to fetch {what}"),
            Some(error.to_owned()),
        )
    }
}

/// Fan-out of notifications to any number of subscribers.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Arc<Notification>>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, notification: Notification) {
        tracing::debug!(
            level = %notification.level,
            title = %notification.title,
            "notification"
        );
        // No subscribers is fine.
        let _ = self.tx.send(Arc::new(notification));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cardwatch_api::{AttendanceEvent, IgnoredEvent, UnknownEvent, UserRef};
    use pretty_assertions::assert_eq;

    fn ignored(reason: IgnoreReason, seconds_left: Option<u64>) -> StreamEvent {
        StreamEvent::Ignored(IgnoredEvent {
            uid: "B2".into(),
            reason,
            seconds_left,
            user: None,
            ts: Utc::now(),
        })
    }

    #[test]
    fn attendance_notification() {
        let event = StreamEvent::Attendance(AttendanceEvent {
            uid: "A1".into(),
            user: UserRef {
                id: 1,
                name: "Ada".into(),
            },
            direction: Direction::Out,
            ts: Utc::now(),
        });

        let n = Notification::for_event(&event).unwrap();
        assert_eq!(n.title, "Ada - OUT");
        assert_eq!(n.level, NotificationLevel::Info);
        assert!(n.description.unwrap().starts_with("Registered at "));
    }

    #[test]
    fn unknown_card_warning() {
        let n = Notification::for_event(&StreamEvent::Unknown(UnknownEvent {
            uid: "ZZ9".into(),
            ts: Utc::now(),
        }))
        .unwrap();
        assert_eq!(n.title, "Unknown RFID Card");
        assert_eq!(n.description.as_deref(), Some("UID: ZZ9 is not registered"));
        assert_eq!(n.level, NotificationLevel::Warning);
    }

    #[test]
    fn cooldown_uses_seconds_left_or_default() {
        let n = Notification::for_event(&ignored(IgnoreReason::Cooldown, Some(7))).unwrap();
        assert_eq!(
            n.description.as_deref(),
            Some("Please wait 7s between check-ins")
        );

        let n = Notification::for_event(&ignored(IgnoreReason::Cooldown, None)).unwrap();
        assert_eq!(
            n.description.as_deref(),
            Some("Please wait 3s between check-ins")
        );
    }

    #[test]
    fn burst_description() {
        let n = Notification::for_event(&ignored(IgnoreReason::Burst, None)).unwrap();
        assert_eq!(n.title, "Read Ignored");
        assert_eq!(n.description.as_deref(), Some("Multiple rapid reads detected"));
        assert_eq!(n.level, NotificationLevel::Error);
    }

    #[test]
    fn ping_raises_nothing() {
        assert!(Notification::for_event(&StreamEvent::Ping).is_none());
    }

    #[tokio::test]
    async fn notifier_fans_out() {
        let notifier = Notifier::new(8);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        notifier.publish(Notification::connection_error("Connection lost"));

        assert_eq!(a.recv().await.unwrap().title, "Connection Error");
        assert_eq!(
            b.recv().await.unwrap().description.as_deref(),
            Some("Connection lost")
        );
    }
}
