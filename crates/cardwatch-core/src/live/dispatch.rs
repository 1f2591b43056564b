// ── Event dispatcher ──
//
// One handler slot per event kind. Registration replaces, dispatch is
// synchronous, and an empty slot makes dispatch a no-op.

use std::sync::Arc;

use cardwatch_api::StreamEvent;
use dashmap::DashMap;

/// Discriminant of a [`StreamEvent`], used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Attendance,
    Unknown,
    Ignored,
    Ping,
}

impl EventKind {
    pub fn of(event: &StreamEvent) -> Self {
        match event {
            StreamEvent::Attendance(_) => Self::Attendance,
            StreamEvent::Unknown(_) => Self::Unknown,
            StreamEvent::Ignored(_) => Self::Ignored,
            StreamEvent::Ping => Self::Ping,
        }
    }
}

/// A registered event handler.
pub type Handler = dyn Fn(&StreamEvent) + Send + Sync;

/// Routes each event to the handler registered for its kind.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: DashMap<EventKind, Arc<Handler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `kind`, returning the one it replaced.
    pub fn register<F>(&self, kind: EventKind, handler: F) -> Option<Arc<Handler>>
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler))
    }

    pub fn unregister(&self, kind: EventKind) -> Option<Arc<Handler>> {
        self.handlers.remove(&kind).map(|(_, h)| h)
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.handlers.clear();
    }

    /// Run the handler for `event`'s kind, if any. Returns whether one ran.
    ///
    /// The handler is cloned out of the map before it runs, so a handler
    /// may re-register itself without deadlocking.
    pub fn dispatch(&self, event: &StreamEvent) -> bool {
        let kind = EventKind::of(event);
        let Some(handler) = self.handlers.get(&kind).map(|h| Arc::clone(h.value())) else {
            tracing::trace!(%kind, "no handler registered");
            return false;
        };
        handler(event);
        true
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<EventKind> = self.handlers.iter().map(|e| *e.key()).collect();
        f.debug_struct("EventDispatcher")
            .field("registered", &kinds)
            .finish()
    }
}
