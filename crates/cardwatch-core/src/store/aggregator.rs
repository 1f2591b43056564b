// ── State aggregator ──
//
// Holds the users, attendance and present snapshots. Each one has a
// dedicated refresh worker woken through a `Notify`, so a snapshot never
// has two fetches in flight; requests arriving mid-fetch collapse into
// one follow-up fetch that reads the latest filters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cardwatch_api::{
    Attendance, AttendanceClient, AttendanceFilters, PresentUser, StreamEvent, User,
};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::snapshot::{Snapshot, SnapshotCell};
use crate::error::CoreError;
use crate::notify::{Notification, Notifier};
use crate::stream::SnapshotStream;

/// The three snapshots the aggregator maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SnapshotKind {
    #[strum(to_string = "users")]
    Users,
    #[strum(to_string = "attendance")]
    Attendance,
    #[strum(to_string = "present users")]
    Present,
}

/// One snapshot plus the signal that wakes its worker.
struct Slot<T> {
    cell: SnapshotCell<T>,
    trigger: Notify,
}

impl<T: Clone + Send + Sync + 'static> Slot<T> {
    fn new() -> Self {
        Self {
            cell: SnapshotCell::new(),
            trigger: Notify::new(),
        }
    }

    fn invalidate(&self) {
        self.cell.mark_stale();
        self.trigger.notify_one();
    }
}

/// Shared with the worker tasks.
struct Slots {
    users: Slot<User>,
    attendance: Slot<Attendance>,
    present: Slot<PresentUser>,
}

struct Workers {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Owner of the dashboard's snapshots.
pub struct StateAggregator {
    client: AttendanceClient,
    notifier: Notifier,
    present_interval: Duration,
    slots: Arc<Slots>,
    filters: watch::Sender<AttendanceFilters>,
    workers: Mutex<Option<Workers>>,
}

impl StateAggregator {
    pub fn new(
        client: AttendanceClient,
        notifier: Notifier,
        present_interval: Duration,
        filters: AttendanceFilters,
    ) -> Self {
        let (filters, _) = watch::channel(filters);
        Self {
            client,
            notifier,
            present_interval,
            slots: Arc::new(Slots {
                users: Slot::new(),
                attendance: Slot::new(),
                present: Slot::new(),
            }),
            filters,
            workers: Mutex::new(None),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the refresh workers and request an initial fetch of every
    /// snapshot. Does nothing if already started.
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        if workers.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(3);

        let client = self.client.clone();
        handles.push(spawn_worker(
            SnapshotKind::Users,
            Arc::clone(&self.slots),
            |slots| &slots.users,
            move || {
                let client = client.clone();
                async move { client.list_users().await }
            },
            None,
            self.notifier.clone(),
            cancel.clone(),
        ));

        let client = self.client.clone();
        let filters = self.filters.subscribe();
        handles.push(spawn_worker(
            SnapshotKind::Attendance,
            Arc::clone(&self.slots),
            |slots| &slots.attendance,
            move || {
                let client = client.clone();
                let filters = filters.borrow().clone();
                async move { client.list_attendance(&filters).await }
            },
            None,
            self.notifier.clone(),
            cancel.clone(),
        ));

        let client = self.client.clone();
        handles.push(spawn_worker(
            SnapshotKind::Present,
            Arc::clone(&self.slots),
            |slots| &slots.present,
            move || {
                let client = client.clone();
                async move { client.list_present().await }
            },
            Some(self.present_interval).filter(|d| !d.is_zero()),
            self.notifier.clone(),
            cancel.clone(),
        ));

        self.refresh_all();
        *workers = Some(Workers { cancel, handles });
        debug!("snapshot workers started");
    }

    /// Cancel the workers and wait for them to exit. In-flight fetches
    /// are abandoned. Safe to call repeatedly.
    pub async fn stop(&self) {
        let workers = self.workers.lock().await.take();
        let Some(workers) = workers else {
            return;
        };
        workers.cancel.cancel();
        for handle in workers.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "snapshot worker ended abnormally");
            }
        }
        debug!("snapshot workers stopped");
    }

    /// Return every snapshot to `Empty` and restore `filters`.
    pub fn reset(&self, filters: AttendanceFilters) {
        self.slots.users.cell.reset();
        self.slots.attendance.cell.reset();
        self.slots.present.cell.reset();
        self.filters.send_replace(filters);
    }

    // ── Invalidation ─────────────────────────────────────────────────

    /// Mark one snapshot stale and request a refresh.
    pub fn invalidate(&self, kind: SnapshotKind) {
        debug!(snapshot = %kind, "invalidated");
        match kind {
            SnapshotKind::Users => self.slots.users.invalidate(),
            SnapshotKind::Attendance => self.slots.attendance.invalidate(),
            SnapshotKind::Present => self.slots.present.invalidate(),
        }
    }

    pub fn refresh_all(&self) {
        self.invalidate(SnapshotKind::Users);
        self.invalidate(SnapshotKind::Attendance);
        self.invalidate(SnapshotKind::Present);
    }

    /// Apply a live event. Only attendance records change server state
    /// that the snapshots mirror; other kinds are ignored here.
    pub fn apply_event(&self, event: &StreamEvent) {
        if let StreamEvent::Attendance(_) = event {
            self.invalidate(SnapshotKind::Attendance);
            self.invalidate(SnapshotKind::Present);
        }
    }

    /// Replace the attendance filters and refetch the attendance log.
    pub fn set_filters(&self, filters: AttendanceFilters) {
        self.filters.send_replace(filters);
        self.invalidate(SnapshotKind::Attendance);
    }

    pub fn filters(&self) -> AttendanceFilters {
        self.filters.borrow().clone()
    }

    // ── Read views ───────────────────────────────────────────────────

    pub fn users(&self) -> SnapshotStream<User> {
        self.slots.users.cell.subscribe()
    }

    pub fn attendance(&self) -> SnapshotStream<Attendance> {
        self.slots.attendance.cell.subscribe()
    }

    pub fn present(&self) -> SnapshotStream<PresentUser> {
        self.slots.present.cell.subscribe()
    }

    pub fn users_snapshot(&self) -> Snapshot<User> {
        self.slots.users.cell.current()
    }

    pub fn attendance_snapshot(&self) -> Snapshot<Attendance> {
        self.slots.attendance.cell.current()
    }

    pub fn present_snapshot(&self) -> Snapshot<PresentUser> {
        self.slots.present.cell.current()
    }
}

impl Drop for StateAggregator {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.get_mut().take() {
            workers.cancel.cancel();
        }
    }
}

// ── Refresh worker ───────────────────────────────────────────────────

/// Spawn the single fetch loop for one snapshot.
///
/// Wakes on its trigger (and on `interval` ticks when given), fetches,
/// and swaps the result in. Failures keep the previous items and raise
/// a warning notification; the next trigger retries.
fn spawn_worker<T, F, Fut>(
    kind: SnapshotKind,
    slots: Arc<Slots>,
    select: fn(&Slots) -> &Slot<T>,
    fetch: F,
    interval: Option<Duration>,
    notifier: Notifier,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, cardwatch_api::Error>> + Send,
{
    tokio::spawn(async move {
        let slot = select(&slots);
        let mut ticker = interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = slot.trigger.notified() => {}
                () = next_tick(ticker.as_mut()) => {
                    debug!(snapshot = %kind, "interval refresh");
                }
            }

            slot.cell.begin_loading();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = fetch() => result,
            };

            match result {
                Ok(items) => {
                    debug!(snapshot = %kind, count = items.len(), "snapshot refreshed");
                    slot.cell.complete(items);
                }
                Err(e) => {
                    let err = CoreError::from(e);
                    warn!(snapshot = %kind, error = %err, "snapshot refresh failed");
                    slot.cell.fail(err.to_string());
                    notifier.publish(Notification::fetch_failed(&kind.to_string(), &err.to_string()));
                }
            }
        }

        slot.cell.abandon_loading();
    })
}

async fn next_tick(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
