// ── Dashboard provider ──
//
// Owns one stream client, one dispatcher registry, one monitor and one
// aggregator, and wires them together for the lifetime of a mount.
// Presentation layers only see read-only views, notifications and the
// roster mutation methods.

use std::sync::Arc;

use cardwatch_api::{
    Attendance, AttendanceClient, AttendanceFilters, CreateUserRequest, HealthStatus,
    PresentUser, SseConnector, StreamConnector, UpdateUserRequest, User,
};
use chrono::Local;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info};

use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::live::{
    ConnectionMonitor, ConnectionState, EventDispatcher, EventKind, LifecycleHooks, StreamClient,
};
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::stats::DashboardStats;
use crate::store::{SnapshotKind, StateAggregator};
use crate::stream::SnapshotStream;

const REQUIRED_FIELDS: &str = "Name and Card UID are required";

/// Entry point for presentation layers.
///
/// Cheaply cloneable. Construction does no I/O; call
/// [`mount()`](Self::mount) to fetch snapshots and open the stream.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    api: AttendanceClient,
    connector: Arc<dyn StreamConnector>,
    monitor: ConnectionMonitor,
    notifier: Notifier,
    aggregator: Arc<StateAggregator>,
    session: Mutex<Option<Session>>,
}

/// Everything created by one `mount()` and torn down by `unmount()`.
struct Session {
    dispatcher: Arc<EventDispatcher>,
    client: StreamClient,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let api = AttendanceClient::new(config.api_url.clone(), &transport)?;
        let connector = SseConnector::new(config.stream_url()?, &transport)?;
        Ok(Self::with_parts(config, api, Arc::new(connector)))
    }

    /// Build from an existing REST client and stream connector.
    pub fn with_parts(
        config: DashboardConfig,
        api: AttendanceClient,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        let notifier = Notifier::new(config.notification_capacity);
        let aggregator = Arc::new(StateAggregator::new(
            api.clone(),
            notifier.clone(),
            config.present_refresh_interval,
            config.initial_filters.clone(),
        ));

        Self {
            inner: Arc::new(DashboardInner {
                config,
                api,
                connector,
                monitor: ConnectionMonitor::new(),
                notifier,
                aggregator,
                session: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a session: register handlers, fetch every snapshot and open
    /// the stream. Does nothing if already mounted.
    pub async fn mount(&self) {
        let mut session = self.inner.session.lock().await;
        if session.is_some() {
            return;
        }

        let dispatcher = Arc::new(EventDispatcher::new());
        self.register_handlers(&dispatcher);

        self.inner.aggregator.start().await;

        let notifier = self.inner.notifier.clone();
        let hooks = LifecycleHooks::new()
            .on_connect(|| info!("event stream connected"))
            .on_error(move |reason| notifier.publish(Notification::connection_error(reason)));

        let client = StreamClient::new(
            Arc::clone(&self.inner.connector),
            Arc::clone(&dispatcher),
            self.inner.monitor.clone(),
            self.inner.config.reconnect,
            hooks,
        );
        client.connect().await;

        *session = Some(Session { dispatcher, client });
        info!(api = %self.inner.config.api_url, "dashboard mounted");
    }

    /// Tear the session down: close the stream, cancel any retry, drop
    /// every handler and stop the snapshot workers. Idempotent.
    pub async fn unmount(&self) {
        let mut session = self.inner.session.lock().await;
        let Some(current) = session.take() else {
            return;
        };

        current.client.disconnect().await;
        current.dispatcher.clear();
        self.inner.aggregator.stop().await;
        info!("dashboard unmounted");
    }

    /// Hard reset: unmount, return the monitor and every snapshot to
    /// their initial values, then mount a fresh session.
    pub async fn reconnect(&self) {
        info!("dashboard reconnecting");
        self.unmount().await;
        self.inner.monitor.reset();
        self.inner
            .aggregator
            .reset(self.inner.config.initial_filters.clone());
        self.mount().await;
    }

    pub async fn is_mounted(&self) -> bool {
        self.inner.session.lock().await.is_some()
    }

    fn register_handlers(&self, dispatcher: &EventDispatcher) {
        let aggregator = Arc::clone(&self.inner.aggregator);
        let notifier = self.inner.notifier.clone();
        dispatcher.register(EventKind::Attendance, move |event| {
            aggregator.apply_event(event);
            if let Some(n) = Notification::for_event(event) {
                notifier.publish(n);
            }
        });

        for kind in [EventKind::Unknown, EventKind::Ignored] {
            let notifier = self.inner.notifier.clone();
            dispatcher.register(kind, move |event| {
                if let Some(n) = Notification::for_event(event) {
                    notifier.publish(n);
                }
            });
        }
    }

    // ── Filters ──────────────────────────────────────────────────────

    pub fn set_filters(&self, filters: AttendanceFilters) {
        debug!(?filters, "attendance filters changed");
        self.inner.aggregator.set_filters(filters);
    }

    pub fn filters(&self) -> AttendanceFilters {
        self.inner.aggregator.filters()
    }

    // ── Read views ───────────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.monitor.subscribe_state()
    }

    pub fn last_event(&self) -> watch::Receiver<Option<String>> {
        self.inner.monitor.subscribe_last_event()
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.inner.monitor
    }

    pub fn users(&self) -> SnapshotStream<User> {
        self.inner.aggregator.users()
    }

    pub fn attendance(&self) -> SnapshotStream<Attendance> {
        self.inner.aggregator.attendance()
    }

    pub fn present(&self) -> SnapshotStream<PresentUser> {
        self.inner.aggregator.present()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.notifier.subscribe()
    }

    /// Counters over the snapshots currently held.
    pub fn stats(&self) -> DashboardStats {
        let aggregator = &self.inner.aggregator;
        DashboardStats::compute(
            &aggregator.users_snapshot().items,
            &aggregator.present_snapshot().items,
            &aggregator.attendance_snapshot().items,
            Local::now().date_naive(),
        )
    }

    // ── Roster mutations ─────────────────────────────────────────────

    pub async fn create_user(&self, name: &str, card_uid: &str) -> Result<User, CoreError> {
        let (name, card_uid) = (name.trim(), card_uid.trim());
        if name.is_empty() || card_uid.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: REQUIRED_FIELDS.into(),
            });
        }

        let req = CreateUserRequest {
            name: name.to_owned(),
            card_uid: card_uid.to_owned(),
        };
        match self.inner.api.create_user(&req).await {
            Ok(user) => {
                self.roster_changed("User created successfully");
                Ok(user)
            }
            Err(e) => Err(self.mutation_failed("create", e)),
        }
    }

    /// Rename a user or reassign their card. Absent fields are unchanged;
    /// present ones must not be blank.
    pub async fn update_user(
        &self,
        id: i64,
        name: Option<&str>,
        card_uid: Option<&str>,
    ) -> Result<User, CoreError> {
        let name = name.map(str::trim);
        let card_uid = card_uid.map(str::trim);
        if name.is_some_and(str::is_empty) || card_uid.is_some_and(str::is_empty) {
            return Err(CoreError::ValidationFailed {
                message: REQUIRED_FIELDS.into(),
            });
        }

        let req = UpdateUserRequest {
            name: name.map(str::to_owned),
            card_uid: card_uid.map(str::to_owned),
            active: None,
        };
        if req.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "Nothing to update".into(),
            });
        }
        self.apply_update(id, &req).await
    }

    pub async fn set_user_active(&self, id: i64, active: bool) -> Result<User, CoreError> {
        self.apply_update(id, &UpdateUserRequest::active(active))
            .await
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), CoreError> {
        match self.inner.api.delete_user(id).await {
            Ok(()) => {
                self.roster_changed("User deleted successfully");
                Ok(())
            }
            Err(e) => Err(self.mutation_failed("delete", e)),
        }
    }

    async fn apply_update(&self, id: i64, req: &UpdateUserRequest) -> Result<User, CoreError> {
        match self.inner.api.update_user(id, req).await {
            Ok(user) => {
                self.roster_changed("User updated successfully");
                Ok(user)
            }
            Err(e) => Err(self.mutation_failed("update", e)),
        }
    }

    fn roster_changed(&self, title: &str) {
        self.inner.aggregator.invalidate(SnapshotKind::Users);
        self.inner.notifier.publish(Notification::success(title));
    }

    fn mutation_failed(&self, action: &str, err: cardwatch_api::Error) -> CoreError {
        let err = CoreError::from_mutation(err);
        self.inner.notifier.publish(Notification::new(
            NotificationLevel::Error,
            format!("Failed to {action} user"),
            Some(err.to_string()),
        ));
        err
    }

    // ── One-shot reads ───────────────────────────────────────────────

    pub async fn fetch_users(&self) -> Result<Vec<User>, CoreError> {
        Ok(self.inner.api.list_users().await?)
    }

    pub async fn fetch_attendance(
        &self,
        filters: &AttendanceFilters,
    ) -> Result<Vec<Attendance>, CoreError> {
        Ok(self.inner.api.list_attendance(filters).await?)
    }

    pub async fn fetch_present(&self) -> Result<Vec<PresentUser>, CoreError> {
        Ok(self.inner.api.list_present().await?)
    }

    pub async fn check_health(&self) -> Result<HealthStatus, CoreError> {
        Ok(self.inner.api.health().await?)
    }
}
