// cardwatch-core: Live event ingestion and snapshot aggregation between cardwatch-api and consumers.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod live;
pub mod notify;
pub mod stats;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_API_URL, DashboardConfig, ReconnectPolicy};
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use live::{
    ConnectionMonitor, ConnectionState, EventDispatcher, EventKind, LifecycleHooks, StreamClient,
};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use stats::DashboardStats;
pub use store::{Freshness, Snapshot, SnapshotKind, StateAggregator};
pub use stream::SnapshotStream;

// Re-export wire and resource models so consumers need only this crate.
pub use cardwatch_api::{
    Attendance, AttendanceEvent, AttendanceFilters, Direction, HealthStatus, IgnoreReason,
    IgnoredEvent, PresentUser, StreamEvent, UnknownEvent, User, UserRef,
};
